use std::sync::Arc;

use crate::company::CompanySearch;
use crate::config::Config;
use crate::document::DocumentExtractor;
use crate::llm_client::ChatCompletion;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimiter;
use crate::routes::health::SystemMonitor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Completion backend. `LlmClient` in production, a scripted fake in tests.
    pub llm: Arc<dyn ChatCompletion>,
    /// Company search backend. `ExaClient` in production.
    pub company_search: Arc<dyn CompanySearch>,
    pub extractor: DocumentExtractor,
    pub metrics: Arc<Metrics>,
    pub rate_limiter: RateLimiter,
    pub system: SystemMonitor,
}

impl AppState {
    pub fn new(
        config: Config,
        llm: Arc<dyn ChatCompletion>,
        company_search: Arc<dyn CompanySearch>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let extractor = DocumentExtractor::new(&config.upload_tmp_dir, &config.limits);
        let rate_limiter = RateLimiter::new(config.rate_limits.clone());
        Self {
            config: Arc::new(config),
            llm,
            company_search,
            extractor,
            metrics,
            rate_limiter,
            system: SystemMonitor::new(),
        }
    }
}
