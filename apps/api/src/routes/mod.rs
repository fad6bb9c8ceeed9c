pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::company::handlers::handle_analyze_company;
use crate::config::Config;
use crate::cover_letter::handlers::handle_generate_cover_letter;
use crate::document::handlers::handle_parse_document;
use crate::job::handlers::handle_analyze_job_image;
use crate::middleware::{
    error_report::{error_report_middleware, handle_panic},
    http_metrics::http_metrics_middleware,
    rate_limit::{rate_limit_middleware, LIMIT_HEADER, REMAINING_HEADER},
    request_id::{request_id_middleware, REQUEST_ID_HEADER},
};
use crate::state::AppState;

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Layers listed innermost first: panics are caught closest to the handler,
/// and the request ID wraps everything so every response carries it.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(health::metrics_handler))
        .route("/api/generate_cover_letter", post(handle_generate_cover_letter))
        .route("/api/parse_document", post(handle_parse_document))
        .route("/api/analyze_job_desc_image", post(handle_analyze_job_image))
        .route("/api/analyze_company", post(handle_analyze_company))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(DefaultBodyLimit::max(state.config.limits.max_body_bytes()))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn(error_report_middleware))
        .layer(from_fn_with_state(state.metrics.clone(), http_metrics_middleware))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let exposed = [REQUEST_ID_HEADER, LIMIT_HEADER, REMAINING_HEADER].map(HeaderName::from_static);

    let origins = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    let layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_headers(Any)
        .expose_headers(exposed);

    if config.environment.is_development() {
        layer.allow_methods(Any)
    } else {
        layer.allow_methods([Method::GET, Method::POST])
    }
}
