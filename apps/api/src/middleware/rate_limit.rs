use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{RateLimit, RateLimitConfig, GENERATE_SCOPE};
use crate::errors::AppError;
use crate::middleware::request_id::RequestId;
use crate::state::AppState;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

const DEFAULT_MAX_BUCKETS: usize = 10_000;

#[derive(Debug)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

impl Bucket {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window,
        }
    }

    fn check_and_increment(&mut self, now: Instant, limit: RateLimit) -> Result<u32, Duration> {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + limit.window;
        }
        if self.count < limit.requests {
            self.count += 1;
            Ok(limit.requests - self.count)
        } else {
            Err(self.reset_at.saturating_duration_since(now))
        }
    }
}

/// Result of checking one request against its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Exempt,
    Allowed { limit: RateLimit, remaining: u32 },
    Rejected {
        scope: &'static str,
        limit: RateLimit,
        retry_after: Duration,
    },
}

/// Fixed-window request counters keyed by client address and route scope.
#[derive(Clone)]
pub struct RateLimiter {
    limits: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    max_buckets: usize,
}

impl RateLimiter {
    pub fn new(limits: RateLimitConfig) -> Self {
        Self {
            limits,
            buckets: Arc::new(Mutex::new(HashMap::new())),
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    pub async fn check(&self, client: &str, path: &str) -> Verdict {
        let Some((scope, limit)) = self.limits.scope_for(path) else {
            return Verdict::Exempt;
        };

        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= self.max_buckets {
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            debug!(
                removed = before - buckets.len(),
                "Purged expired rate limit buckets"
            );
        }

        let bucket = buckets
            .entry(format!("{client}|{scope}"))
            .or_insert_with(|| Bucket::new(now, limit.window));

        match bucket.check_and_increment(now, limit) {
            Ok(remaining) => Verdict::Allowed { limit, remaining },
            Err(retry_after) => Verdict::Rejected {
                scope,
                limit,
                retry_after,
            },
        }
    }

    #[cfg(test)]
    fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    #[cfg(test)]
    async fn bucket_count(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

/// Socket address first, then the first `X-Forwarded-For` hop.
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    forwarded_for(request.headers()).unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn set_headers(response: &mut Response, limit: RateLimit, remaining: u32) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert(LIMIT_HEADER, value);
    }
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
}

/// Rejections on the generation route are also recorded as a `rate_limited`
/// generation outcome; the handler never sees them.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let path = request.uri().path().to_string();

    match state.rate_limiter.check(&client, &path).await {
        Verdict::Exempt => next.run(request).await,
        Verdict::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            set_headers(&mut response, limit, remaining);
            response
        }
        Verdict::Rejected {
            scope,
            limit,
            retry_after,
        } => {
            warn!("Rate limit {} exceeded for {} on {}", limit, client, path);
            let error = AppError::RateLimited {
                limit: limit.to_string(),
                retry_after_secs: retry_after.as_secs().max(1),
            };
            if scope == GENERATE_SCOPE {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(RequestId::as_str)
                    .unwrap_or_default();
                state.metrics.record_outcome(error.metric_label(), request_id);
            }
            let mut response = error.into_response();
            set_headers(&mut response, limit, 0);
            response
        }
    }
}
