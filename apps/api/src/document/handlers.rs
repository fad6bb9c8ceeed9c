//! Axum route handlers for standalone document parsing.

use axum::extract::{multipart::MultipartRejection, Multipart, State};

use crate::document::extractor::CV_FIELD;
use crate::errors::AppError;
use crate::models::upload::FormParts;
use crate::state::AppState;

/// POST /api/parse_document
///
/// Extracts the normalized text of an uploaded résumé and returns it as
/// `text/plain`.
pub async fn handle_parse_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, AppError> {
    let mut form = FormParts::read(multipart).await?;
    let file = form
        .take_file(CV_FIELD)
        .ok_or_else(|| AppError::invalid_field(CV_FIELD, "no file was uploaded"))?;

    state.extractor.extract(&file).await
}
