//! The generate-cover-letter orchestration: validate everything up front,
//! then run the four timed steps in order.

use std::time::Instant;

use tracing::{info, warn};

use crate::company::enricher::{enrich, COMPANY_FIELD};
use crate::cover_letter::generator::{generate_cover_letter, LetterInput};
use crate::document::extractor::CV_FIELD;
use crate::errors::AppError;
use crate::job::resolver::{resolve, select_job_input, IMAGE_FIELD, TEXT_FIELD};
use crate::metrics::Metrics;
use crate::models::upload::{FormParts, UploadedFile};
use crate::state::AppState;

pub const WORD_LIMIT_FIELD: &str = "word_limit";

/// Raw inputs of one generation request, as received.
#[derive(Debug, Default)]
pub struct CoverLetterRequest {
    pub cv_file: Option<UploadedFile>,
    pub job_desc_text: Option<String>,
    pub job_desc_image: Option<UploadedFile>,
    pub company_name: Option<String>,
    pub word_limit: Option<u32>,
}

impl CoverLetterRequest {
    pub fn from_form(mut form: FormParts) -> Result<Self, AppError> {
        Ok(Self {
            cv_file: form.take_file(CV_FIELD),
            job_desc_text: form.take_text(TEXT_FIELD),
            job_desc_image: form.take_file(IMAGE_FIELD),
            company_name: form.take_text(COMPANY_FIELD),
            word_limit: form.take_u32(WORD_LIMIT_FIELD)?,
        })
    }
}

/// Runs the pipeline. No step starts (and no external call is made) until
/// every input has passed validation. Company lookup failures are logged and
/// the letter is written without company context.
pub async fn run(state: &AppState, request: CoverLetterRequest) -> Result<String, AppError> {
    let started = Instant::now();
    info!("Starting cover letter generation process");

    let limits = &state.config.limits;
    let cv_file = request
        .cv_file
        .ok_or_else(|| AppError::invalid_field(CV_FIELD, "a CV file is required"))?;
    state.extractor.validate(&cv_file)?;
    let job_input = select_job_input(request.job_desc_text, request.job_desc_image, limits.max_image_bytes)?;
    let word_limit = match request.word_limit {
        Some(value) if !limits.word_limit.contains(value) => {
            return Err(AppError::invalid_field(
                WORD_LIMIT_FIELD,
                format!(
                    "must be between {} and {} words",
                    limits.word_limit.min, limits.word_limit.max
                ),
            ))
        }
        Some(value) => value,
        None => limits.word_limit.default,
    };

    let resume_text = {
        let _timer = state.metrics.step_timer("document_processing");
        state.extractor.extract(&cv_file).await?
    };

    let job_description = {
        let _timer = state.metrics.step_timer("job_analysis");
        resolve(state.llm.as_ref(), job_input).await?
    };

    let company_info = match request.company_name {
        Some(name) => {
            let _timer = state.metrics.step_timer("company_analysis");
            match enrich(state.company_search.as_ref(), &name, limits.company_blurb_max_chars).await {
                Ok(blurb) => {
                    info!("Company information retrieved for {}", name.trim());
                    Some(blurb)
                }
                Err(e) => {
                    warn!("Company analysis failed, continuing without company information: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let letter = {
        let _timer = state.metrics.step_timer("letter_generation");
        let input = LetterInput {
            resume_text: &resume_text,
            job_description: &job_description,
            company_info: company_info.as_deref(),
            word_limit,
        };
        generate_cover_letter(state.llm.as_ref(), &input, limits.min_letter_chars).await?
    };

    info!(
        "Cover letter generated successfully in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(letter)
}

/// Bumps the outcome counter: `success`, or the failing error's label.
pub fn record_outcome(metrics: &Metrics, outcome: &Result<String, AppError>, request_id: &str) {
    let status = match outcome {
        Ok(_) => "success",
        Err(e) => e.metric_label(),
    };
    metrics.record_outcome(status, request_id);
}
