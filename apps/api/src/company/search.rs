use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::config::ExaConfig;
use crate::errors::AppError;
use crate::metrics::Metrics;

/// Service name reported in errors and the external API error counter.
pub const SERVICE_NAME: &str = "Exa";

/// Best search result for a company.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompanyHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// Looks a company up on the web. `Ok(None)` means the search ran and found nothing.
#[async_trait]
pub trait CompanySearch: Send + Sync {
    async fn search_company(&self, subject: &str) -> Result<Option<CompanyHit>, AppError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    num_results: u32,
    use_autoprompt: bool,
    category: &'static str,
    contents: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CompanyHit>,
}

/// Exa `/search` client. One attempt per lookup; failures are not retried.
#[derive(Clone)]
pub struct ExaClient {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    metrics: Arc<Metrics>,
}

impl ExaClient {
    pub fn new(config: &ExaConfig, timeout: Duration, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the search API")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            metrics,
        })
    }

    fn request_for(subject: &str) -> SearchRequest {
        SearchRequest {
            query: format!("Description of {subject} company:"),
            num_results: 1,
            use_autoprompt: true,
            category: "company",
            contents: json!({
                "summary": {
                    "query": format!(
                        "What does {subject} do as a company? What are their main products and services?"
                    )
                },
                "highlights": {
                    "numSentences": 3,
                    "highlightsPerUrl": 2,
                    "query": format!("Key information about {subject} company")
                }
            }),
        }
    }

    fn failure(&self, message: String) -> AppError {
        self.metrics.record_api_error(SERVICE_NAME);
        error!("{} search failed: {}", SERVICE_NAME, message);
        AppError::api(SERVICE_NAME, message)
    }
}

#[async_trait]
impl CompanySearch for ExaClient {
    async fn search_company(&self, subject: &str) -> Result<Option<CompanyHit>, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::configuration("EXA_API_KEY", "API key is not set"))?;

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .json(&Self::request_for(subject))
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.failure(format!("status {}: {}", status.as_u16(), body.trim())));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| self.failure(format!("could not decode response: {e}")))?;

        debug!("{} returned {} result(s) for {}", SERVICE_NAME, parsed.results.len(), subject);
        Ok(parsed.results.into_iter().next())
    }
}
