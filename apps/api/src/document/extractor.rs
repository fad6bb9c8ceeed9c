use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::Limits;
use crate::document::formats;
use crate::errors::AppError;
use crate::models::upload::UploadedFile;

/// Form field the résumé arrives in; used to attribute validation errors.
pub const CV_FIELD: &str = "cv_file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 3] = [DocumentFormat::Pdf, DocumentFormat::Docx, DocumentFormat::Doc];

    /// Accepts the extension with its leading dot, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            ".pdf" => Some(DocumentFormat::Pdf),
            ".docx" => Some(DocumentFormat::Docx),
            ".doc" => Some(DocumentFormat::Doc),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => ".pdf",
            DocumentFormat::Docx => ".docx",
            DocumentFormat::Doc => ".doc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Doc => "DOC",
        }
    }

    fn parser(self) -> Parser {
        match self {
            DocumentFormat::Pdf => formats::pdf_text,
            DocumentFormat::Docx => formats::docx_text,
            DocumentFormat::Doc => formats::doc_text,
        }
    }
}

type Parser = fn(&Path) -> anyhow::Result<String>;

fn allowed_extensions() -> String {
    DocumentFormat::ALL
        .iter()
        .map(|f| f.extension())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns an uploaded résumé into normalized plain text.
///
/// Each extraction writes the upload to its own temporary file under
/// `upload_dir`; the file is removed before `extract` returns, whatever the
/// outcome (parser error and parser panic included).
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    upload_dir: PathBuf,
    max_bytes: usize,
    min_chars: usize,
}

impl DocumentExtractor {
    pub fn new(upload_dir: impl Into<PathBuf>, limits: &Limits) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes: limits.max_cv_bytes,
            min_chars: limits.min_resume_chars,
        }
    }

    /// Cheap checks that need no parsing. Runs before anything touches disk.
    pub fn validate(&self, file: &UploadedFile) -> Result<DocumentFormat, AppError> {
        let format = file
            .extension()
            .as_deref()
            .and_then(DocumentFormat::from_extension)
            .ok_or_else(|| {
                AppError::invalid_field(
                    CV_FIELD,
                    format!(
                        "unsupported file type '{}'; allowed types are {}",
                        file.filename,
                        allowed_extensions()
                    ),
                )
            })?;

        if file.is_empty() {
            return Err(AppError::invalid_field(CV_FIELD, "the uploaded file is empty"));
        }
        if file.len() > self.max_bytes {
            return Err(AppError::invalid_field(
                CV_FIELD,
                format!(
                    "file is {} bytes; the maximum is {} MB",
                    file.len(),
                    self.max_bytes / (1024 * 1024)
                ),
            ));
        }

        Ok(format)
    }

    pub async fn extract(&self, file: &UploadedFile) -> Result<String, AppError> {
        let format = self.validate(file)?;
        self.extract_with(file, format, format.parser()).await
    }

    async fn extract_with(
        &self,
        file: &UploadedFile,
        format: DocumentFormat,
        parse: Parser,
    ) -> Result<String, AppError> {
        info!("Processing file: {}", file.filename);

        let dir = self.upload_dir.clone();
        let bytes = file.bytes.clone();
        let raw = tokio::task::spawn_blocking(move || extract_from_temp_file(&dir, format, parse, &bytes))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    AppError::document(format.label(), "the document parser crashed on this file")
                } else {
                    AppError::Internal(e.into())
                }
            })?
            .map_err(|e| AppError::document(format.label(), format!("{e:#}")))?;

        let text = normalize_whitespace(&raw);
        let chars = text.chars().count();
        if chars < self.min_chars {
            return Err(AppError::document(
                format.label(),
                format!(
                    "could not extract sufficient text ({chars} characters, at least {} required)",
                    self.min_chars
                ),
            ));
        }

        info!(
            "Successfully extracted {} characters from {}",
            chars,
            format.label()
        );
        Ok(text)
    }
}

fn extract_from_temp_file(
    dir: &Path,
    format: DocumentFormat,
    parse: Parser,
    bytes: &[u8],
) -> anyhow::Result<String> {
    let mut tmp = tempfile::Builder::new()
        .prefix("cv-")
        .suffix(format.extension())
        .tempfile_in(dir)
        .with_context(|| format!("could not create temporary file in {}", dir.display()))?;
    tmp.write_all(bytes).context("could not write temporary file")?;
    tmp.flush().context("could not write temporary file")?;
    debug!("Wrote upload to {}", tmp.path().display());

    // A panicking parser unwinds through `tmp`, whose drop removes the file.
    let result = parse(tmp.path());

    let path = tmp.path().to_path_buf();
    match tmp.close() {
        Ok(()) => debug!("Removed temporary file {}", path.display()),
        Err(e) => warn!("Failed to remove temporary file {}: {}", path.display(), e),
    }

    result
}

/// Collapses every run of whitespace (newlines included) into one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
