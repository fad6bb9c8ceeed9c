use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::job::prompts::{JOB_IMAGE_SYSTEM, JOB_IMAGE_USER};
use crate::llm_client::{ChatCompletion, ChatMessage, CompletionRequest, SERVICE_NAME};
use crate::models::upload::UploadedFile;

pub const TEXT_FIELD: &str = "job_desc_text";
pub const IMAGE_FIELD: &str = "job_desc_image";

/// A validated job posting screenshot.
#[derive(Debug, Clone)]
pub struct JobImage {
    pub bytes: Bytes,
    /// Always an `image/*` type.
    pub media_type: String,
}

impl JobImage {
    /// Validates an uploaded file as a job posting image.
    ///
    /// A missing content type is guessed from the extension; a content type
    /// that is present but not `image/*` is rejected.
    pub fn from_upload(file: UploadedFile, max_bytes: usize) -> Result<Self, AppError> {
        let declared = file
            .content_type
            .as_deref()
            .map(|ct| ct.trim().to_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

        let media_type = match declared {
            Some(ct) if ct.starts_with("image/") => ct,
            Some(ct) => {
                return Err(AppError::invalid_field(
                    IMAGE_FIELD,
                    format!("uploaded file is not an image (content type '{ct}')"),
                ))
            }
            None => guess_media_type(&file).ok_or_else(|| {
                AppError::invalid_field(
                    IMAGE_FIELD,
                    "uploaded file is not a valid image format; supported formats include JPEG, PNG, GIF and WEBP",
                )
            })?,
        };

        if file.is_empty() {
            return Err(AppError::invalid_field(IMAGE_FIELD, "the uploaded image is empty"));
        }
        if file.len() > max_bytes {
            return Err(AppError::invalid_field(
                IMAGE_FIELD,
                format!(
                    "image is {} bytes; the maximum is {} MB",
                    file.len(),
                    max_bytes / (1024 * 1024)
                ),
            ));
        }

        Ok(Self {
            bytes: file.bytes,
            media_type,
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }
}

fn guess_media_type(file: &UploadedFile) -> Option<String> {
    let media_type = match file.extension()?.as_str() {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        _ => return None,
    };
    Some(media_type.to_string())
}

/// Where the job description comes from. Built only by `select_job_input`.
#[derive(Debug, Clone)]
pub enum JobDescriptionInput {
    Text(String),
    Image(JobImage),
}

/// Picks the job description source. An image takes priority over text when
/// both are supplied; blank text counts as absent.
pub fn select_job_input(
    text: Option<String>,
    image: Option<UploadedFile>,
    max_image_bytes: usize,
) -> Result<JobDescriptionInput, AppError> {
    let text = text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    match (text, image) {
        (text, Some(image)) => {
            if text.is_some() {
                info!("Both job description text and image provided; using the image");
            }
            Ok(JobDescriptionInput::Image(JobImage::from_upload(image, max_image_bytes)?))
        }
        (Some(text), None) => Ok(JobDescriptionInput::Text(text)),
        (None, None) => Err(AppError::validation(format!(
            "either {TEXT_FIELD} or {IMAGE_FIELD} must be provided"
        ))),
    }
}

/// Produces the job description text for the chosen source.
pub async fn resolve(llm: &dyn ChatCompletion, input: JobDescriptionInput) -> Result<String, AppError> {
    match input {
        JobDescriptionInput::Text(text) => {
            info!("Using job description text ({} characters)", text.chars().count());
            Ok(text)
        }
        JobDescriptionInput::Image(image) => analyze_job_image(llm, &image).await,
    }
}

/// Asks the multimodal model to transcribe a job posting screenshot.
pub async fn analyze_job_image(llm: &dyn ChatCompletion, image: &JobImage) -> Result<String, AppError> {
    info!(
        "Analyzing job description image ({}, {} bytes)",
        image.media_type,
        image.bytes.len()
    );

    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(JOB_IMAGE_SYSTEM),
            ChatMessage::user_with_image(JOB_IMAGE_USER, image.data_url()),
        ],
        ..Default::default()
    };

    let analysis = llm.complete(request).await?.trim().to_string();
    if analysis.is_empty() {
        return Err(AppError::api(
            SERVICE_NAME,
            "the model returned an empty job description for the image",
        ));
    }

    info!("Job description extracted from image ({} characters)", analysis.chars().count());
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{ContentPart, MessageContent};
    use crate::testing::FakeLlm;

    const MAX: usize = 1024;

    fn png(name: &str) -> UploadedFile {
        UploadedFile::new(name, Some("image/png"), vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_image_wins_over_text() {
        let input = select_job_input(Some("Backend role".into()), Some(png("jd.png")), MAX).unwrap();
        assert!(matches!(input, JobDescriptionInput::Image(_)));
    }

    #[test]
    fn test_text_is_trimmed() {
        match select_job_input(Some("  Backend role \n".into()), None, MAX).unwrap() {
            JobDescriptionInput::Text(text) => assert_eq!(text, "Backend role"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_neither_source_is_validation_error() {
        assert!(matches!(
            select_job_input(None, None, MAX),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            select_job_input(Some(" \n\t ".into()), None, MAX),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn test_non_image_content_type_rejected() {
        let file = UploadedFile::new("jd.pdf", Some("application/pdf"), vec![1, 2, 3]);
        match select_job_input(Some("fallback text".into()), Some(file), MAX) {
            Err(AppError::Validation { field, .. }) => assert_eq!(field.as_deref(), Some(IMAGE_FIELD)),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_content_type_guessed_from_extension() {
        let file = UploadedFile::new("posting.JPG", None, vec![0xFF, 0xD8]);
        let image = JobImage::from_upload(file, MAX).unwrap();
        assert_eq!(image.media_type, "image/jpeg");
        assert!(image.data_url().starts_with("data:image/jpeg;base64,"));

        let unknown = UploadedFile::new("posting.bin", None, vec![1]);
        assert!(JobImage::from_upload(unknown, MAX).is_err());
    }

    #[test]
    fn test_image_size_limits() {
        let empty = UploadedFile::new("jd.png", Some("image/png"), Vec::new());
        assert!(JobImage::from_upload(empty, MAX).is_err());

        let big = UploadedFile::new("jd.png", Some("image/png"), vec![0u8; MAX + 1]);
        assert!(JobImage::from_upload(big, MAX).is_err());
    }

    #[tokio::test]
    async fn test_text_resolution_makes_no_model_call() {
        let llm = FakeLlm::replying(&["unused"]);
        let text = resolve(llm.as_ref(), JobDescriptionInput::Text("Rust engineer".into()))
            .await
            .unwrap();
        assert_eq!(text, "Rust engineer");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_resolution_sends_data_url() {
        let llm = FakeLlm::replying(&["  JOB TITLE: Platform Engineer\n"]);
        let image = JobImage::from_upload(png("jd.png"), MAX).unwrap();

        let text = resolve(llm.as_ref(), JobDescriptionInput::Image(image)).await.unwrap();

        assert_eq!(text, "JOB TITLE: Platform Engineer");
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        match &requests[0].messages[1].content {
            MessageContent::Parts(parts) => match &parts[1] {
                ContentPart::ImageUrl { image_url } => {
                    assert!(image_url.url.starts_with("data:image/png;base64,"))
                }
                other => panic!("expected image part, got {other:?}"),
            },
            other => panic!("expected content parts, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_analysis_is_api_error() {
        let llm = FakeLlm::replying(&["   "]);
        let image = JobImage::from_upload(png("jd.png"), MAX).unwrap();
        assert!(matches!(
            analyze_job_image(llm.as_ref(), &image).await,
            Err(AppError::ApiRequest { .. })
        ));
    }
}
