//! Cross-cutting HTTP middleware: correlation IDs, throttling, metrics and
//! uniform error bodies.

pub mod error_report;
pub mod http_metrics;
pub mod rate_limit;
pub mod request_id;
