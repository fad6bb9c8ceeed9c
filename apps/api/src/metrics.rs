//! Prometheus collectors owned by the application.
//!
//! The registry lives in `AppState` rather than in a process global, so tests
//! can build as many independent instances as they like.

use std::time::Instant;

use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::debug;

const STEP_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

pub struct Metrics {
    registry: Registry,
    letters_generated: IntCounterVec,
    step_duration: HistogramVec,
    external_api_errors: IntCounterVec,
    http_requests: IntCounterVec,
    http_latency: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let letters_generated = IntCounterVec::new(
            Opts::new(
                "cover_letter_generated_total",
                "Number of cover letter requests by outcome",
            ),
            &["status"],
        )?;
        let step_duration = HistogramVec::new(
            HistogramOpts::new(
                "cover_letter_processing_time_seconds",
                "Time taken by each cover letter pipeline step",
            )
            .buckets(STEP_BUCKETS.to_vec()),
            &["step"],
        )?;
        let external_api_errors = IntCounterVec::new(
            Opts::new(
                "external_api_errors_total",
                "Failed calls to external APIs, counted per attempt",
            ),
            &["api_name"],
        )?;
        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by route and status"),
            &["method", "path", "status"],
        )?;
        let http_latency = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency"),
            &["method", "path"],
        )?;

        registry.register(Box::new(letters_generated.clone()))?;
        registry.register(Box::new(step_duration.clone()))?;
        registry.register(Box::new(external_api_errors.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_latency.clone()))?;

        Ok(Self {
            registry,
            letters_generated,
            step_duration,
            external_api_errors,
            http_requests,
            http_latency,
        })
    }

    /// Starts a timer that records into the step histogram when dropped.
    pub fn step_timer(&self, step: &'static str) -> StepTimer<'_> {
        StepTimer {
            histogram: &self.step_duration,
            step,
            started: Instant::now(),
        }
    }

    /// Records a pipeline outcome. The request ID is logged next to the
    /// increment so a counter bump can be traced back to its request.
    pub fn record_outcome(&self, status: &str, request_id: &str) {
        self.letters_generated.with_label_values(&[status]).inc();
        debug!(request_id, status, "cover_letter_generated_total incremented");
    }

    pub fn record_api_error(&self, api_name: &str) {
        self.external_api_errors.with_label_values(&[api_name]).inc();
    }

    pub fn record_http(&self, method: &str, path: &str, status: u16, seconds: f64) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_latency
            .with_label_values(&[method, path])
            .observe(seconds);
    }

    #[cfg(test)]
    pub fn outcome_count(&self, status: &str) -> u64 {
        self.letters_generated.with_label_values(&[status]).get()
    }

    #[cfg(test)]
    pub fn api_error_count(&self, api_name: &str) -> u64 {
        self.external_api_errors.with_label_values(&[api_name]).get()
    }

    #[cfg(test)]
    pub fn step_sample_count(&self, step: &str) -> u64 {
        self.step_duration
            .with_label_values(&[step])
            .get_sample_count()
    }

    /// Renders every collector in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }
}

/// Observes the elapsed time of a pipeline step on drop, so failed steps are
/// timed too.
pub struct StepTimer<'a> {
    histogram: &'a HistogramVec,
    step: &'static str,
    started: Instant,
}

impl Drop for StepTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.histogram
            .with_label_values(&[self.step])
            .observe(elapsed);
        debug!("Step {} completed in {:.2} seconds", self.step, elapsed);
    }
}
