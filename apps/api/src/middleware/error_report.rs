use std::any::Any;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::errors::{AppError, ErrorBody, ErrorReport};

/// Plain-text rejection bodies from axum are short; anything longer is cut.
const MAX_REJECTION_BODY: usize = 16 * 1024;

/// Finishes every 4xx/5xx response as the uniform JSON error body.
///
/// Responses built from `AppError` carry an `ErrorReport`; everything else
/// (extractor rejections, unmatched routes, body-limit hits) is rebuilt from
/// its status and plain-text body. The request line is added as `path`, and
/// the error is logged once here: 5xx at error level with the cause chain,
/// 4xx at warn level.
pub async fn error_report_middleware(request: Request, next: Next) -> Response {
    let request_line = format!("{} {}", request.method(), request.uri().path());
    let response = next.run(request).await;

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let (mut error_body, cause_chain) = match parts.extensions.remove::<ErrorReport>() {
        Some(report) => (report.body, Some(report.debug)),
        None => (rejection_body(status, body).await, None),
    };
    error_body.path = Some(request_line);

    if status.is_server_error() {
        error!(
            status = status.as_u16(),
            error = %error_body.error,
            cause = cause_chain.as_deref().unwrap_or(""),
            "{}",
            error_body.message
        );
    } else {
        warn!(
            status = status.as_u16(),
            error = %error_body.error,
            "{}",
            error_body.message
        );
    }

    let mut rebuilt = (status, Json(error_body)).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rebuilt.headers_mut().append(name.clone(), value.clone());
        }
    }
    rebuilt
}

async fn rejection_body(status: StatusCode, body: Body) -> ErrorBody {
    let bytes = to_bytes(body, MAX_REJECTION_BODY).await.unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes).trim().to_string();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        text
    };

    ErrorBody {
        error: category_for_status(status).to_string(),
        message,
        path: None,
        details: None,
    }
}

fn category_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "NotFound",
        StatusCode::METHOD_NOT_ALLOWED => "MethodNotAllowed",
        StatusCode::PAYLOAD_TOO_LARGE => "PayloadTooLarge",
        StatusCode::TOO_MANY_REQUESTS => "RateLimitExceeded",
        s if s.is_client_error() => "ValidationError",
        _ => "InternalError",
    }
}

/// `CatchPanicLayer` handler: a panicking handler becomes an `InternalError`.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn, routing::get, Router};
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app() -> Router {
        Router::new()
            .route("/typed", get(|| async { Err::<String, _>(AppError::invalid_field("word_limit", "too big")) }))
            .route("/plain", get(|| async { (StatusCode::BAD_REQUEST, "Missing field") }))
            .route("/ok", get(|| async { "fine" }))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(from_fn(error_report_middleware))
    }

    #[tokio::test]
    async fn test_typed_errors_gain_request_line() {
        let response = app()
            .oneshot(Request::builder().uri("/typed").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "ValidationError");
        assert_eq!(json["message"], "Invalid word_limit: too big");
        assert_eq!(json["path"], "GET /typed");
        assert_eq!(json["details"]["field"], "word_limit");
    }

    #[tokio::test]
    async fn test_plain_rejections_become_json() {
        let response = app()
            .oneshot(Request::builder().uri("/plain").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["error"], "ValidationError");
        assert_eq!(json["message"], "Missing field");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found_json() {
        let response = app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"], "NotFound");
        assert_eq!(json["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let response = app()
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_panic_payload_becomes_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert!(report.debug.contains("boom"));
        assert_eq!(report.body.error, "InternalError");
    }
}
