//! Test doubles and request builders shared by unit and route tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};

use crate::company::search::{CompanyHit, SERVICE_NAME as SEARCH_SERVICE};
use crate::company::CompanySearch;
use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::{ChatCompletion, CompletionRequest, SERVICE_NAME as LLM_SERVICE};
use crate::metrics::Metrics;
use crate::state::AppState;

/// Scripted completion backend. Replies are consumed in order and the last
/// one repeats; every request is recorded.
pub struct FakeLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeLlm {
    fn scripted(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::scripted(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::scripted(vec![Err(message.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for FakeLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(AppError::api(LLM_SERVICE, message)),
            None => Err(AppError::api(LLM_SERVICE, "no scripted reply")),
        }
    }
}

/// Company search returning a fixed outcome and recording the subjects asked for.
pub struct FakeSearch {
    outcome: Result<Option<CompanyHit>, String>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    fn with(outcome: Result<Option<CompanyHit>, String>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn found(hit: CompanyHit) -> Arc<Self> {
        Self::with(Ok(Some(hit)))
    }

    pub fn empty() -> Arc<Self> {
        Self::with(Ok(None))
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Err("search unavailable".to_string()))
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompanySearch for FakeSearch {
    async fn search_company(&self, subject: &str) -> Result<Option<CompanyHit>, AppError> {
        self.queries.lock().unwrap().push(subject.to_string());
        self.outcome
            .clone()
            .map_err(|message| AppError::api(SEARCH_SERVICE, message))
    }
}

/// Default configuration with uploads going to `upload_dir`.
pub fn test_config(upload_dir: &Path) -> Config {
    let mut config = Config::from_lookup(|_| None).unwrap();
    config.upload_tmp_dir = upload_dir.to_path_buf();
    config
}

pub fn test_state(upload_dir: &Path, llm: Arc<FakeLlm>, search: Arc<FakeSearch>) -> AppState {
    AppState::new(
        test_config(upload_dir),
        llm,
        search,
        Arc::new(Metrics::new().unwrap()),
    )
}

/// Builds `multipart/form-data` request bodies by hand.
pub struct MultipartBody {
    boundary: &'static str,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----coverletter-test-boundary",
            buf: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.buf))
            .unwrap()
    }
}
