//! Axum route handlers for job description analysis.

use axum::extract::{multipart::MultipartRejection, Multipart, State};

use crate::errors::AppError;
use crate::job::resolver::{analyze_job_image, JobImage, IMAGE_FIELD};
use crate::models::upload::FormParts;
use crate::state::AppState;

/// POST /api/analyze_job_desc_image
///
/// Transcribes a job posting screenshot into structured plain text.
pub async fn handle_analyze_job_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, AppError> {
    let mut form = FormParts::read(multipart).await?;
    let file = form
        .take_file(IMAGE_FIELD)
        .ok_or_else(|| AppError::invalid_field(IMAGE_FIELD, "no image was uploaded"))?;
    let image = JobImage::from_upload(file, state.config.limits.max_image_bytes)?;

    analyze_job_image(state.llm.as_ref(), &image).await
}
