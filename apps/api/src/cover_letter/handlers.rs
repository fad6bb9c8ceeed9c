//! Axum route handler for the main generation endpoint.

use axum::extract::{multipart::MultipartRejection, Multipart, State};
use axum::Extension;

use crate::cover_letter::pipeline::{self, CoverLetterRequest};
use crate::errors::AppError;
use crate::middleware::request_id::RequestId;
use crate::models::upload::FormParts;
use crate::state::AppState;

/// POST /api/generate_cover_letter
///
/// Multipart fields: `cv_file` (required), `job_desc_text` and/or
/// `job_desc_image`, optional `company_name` and `word_limit`.
/// Returns the letter as `text/plain`.
pub async fn handle_generate_cover_letter(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, AppError> {
    let outcome = async {
        let form = FormParts::read(multipart).await?;
        let request = CoverLetterRequest::from_form(form)?;
        pipeline::run(&state, request).await
    }
    .await;

    pipeline::record_outcome(&state.metrics, &outcome, request_id.as_str());
    outcome
}
