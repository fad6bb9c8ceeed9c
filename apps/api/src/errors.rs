use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// The response body is finished (request path added, severity logged) by
/// `middleware::error_report`, which reads the `ErrorReport` extension.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", validation_message(.field, .message))]
    Validation {
        message: String,
        field: Option<String>,
        details: Option<Value>,
    },

    #[error("Error processing {doc_type} document: {message}")]
    DocumentProcessing { doc_type: String, message: String },

    #[error("{service} API Error: {message}")]
    ApiRequest { service: String, message: String },

    #[error("Configuration error for {item}: {message}")]
    Configuration { item: String, message: String },

    #[error("Rate limit exceeded: {limit}")]
    RateLimited { limit: String, retry_after_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn validation_message(field: &Option<String>, message: &str) -> String {
    match field {
        Some(field) => format!("Invalid {field}: {message}"),
        None => format!("Validation error: {message}"),
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            details: None,
        }
    }

    pub fn document(doc_type: &str, message: impl Into<String>) -> Self {
        AppError::DocumentProcessing {
            doc_type: doc_type.to_string(),
            message: message.into(),
        }
    }

    pub fn api(service: &str, message: impl Into<String>) -> Self {
        AppError::ApiRequest {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn configuration(item: &str, message: impl Into<String>) -> Self {
        AppError::Configuration {
            item: item.to_string(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::DocumentProcessing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ApiRequest { .. }
            | AppError::Configuration { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable category, returned as the `error` field of the JSON body.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "ValidationError",
            AppError::DocumentProcessing { .. } => "DocumentProcessingError",
            AppError::ApiRequest { .. } => "APIRequestError",
            AppError::Configuration { .. } => "ConfigurationError",
            AppError::RateLimited { .. } => "RateLimitExceeded",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// Coarse failure label used by the outcome counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::DocumentProcessing { .. } => "document_error",
            AppError::ApiRequest { .. } => "api_error",
            AppError::Configuration { .. } => "configuration_error",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Internal(_) => "error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation { details, field, .. } => details.clone().or_else(|| {
                field
                    .as_ref()
                    .map(|f| serde_json::json!({ "field": f }))
            }),
            AppError::DocumentProcessing { doc_type, .. } => {
                Some(serde_json::json!({ "doc_type": doc_type }))
            }
            AppError::ApiRequest { service, .. } => {
                Some(serde_json::json!({ "service": service }))
            }
            AppError::Configuration { item, .. } => {
                Some(serde_json::json!({ "config_item": item }))
            }
            AppError::RateLimited {
                retry_after_secs, ..
            } => Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
            AppError::Internal(_) => None,
        }
    }

    /// Message safe to hand to clients. Internal causes stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON error body shared by every failing route.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Attached to error responses so the reporting middleware can log and
/// complete the body without re-parsing it.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub body: ErrorBody,
    /// `{:?}` of the source error, including the anyhow cause chain.
    pub debug: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.category().to_string(),
            message: self.public_message(),
            path: None,
            details: self.details(),
        };
        let report = ErrorReport {
            body: body.clone(),
            debug: format!("{self:?}"),
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited {
            retry_after_secs, ..
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response.extensions_mut().insert(report);
        response
    }
}
