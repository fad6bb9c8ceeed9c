use std::collections::HashMap;

use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use bytes::Bytes;

use crate::errors::AppError;

/// An uploaded file as received at ingress. Owned by exactly one request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    #[cfg(test)]
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(String::from),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension including the dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.filename.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_lowercase()))
    }
}

/// Multipart form fields collected by name.
///
/// File inputs the browser submits without a selection (no filename, no bytes)
/// are treated as absent.
#[derive(Debug, Default)]
pub struct FormParts {
    files: HashMap<String, UploadedFile>,
    texts: HashMap<String, String>,
}

impl FormParts {
    /// Takes the extractor result directly so a missing or malformed
    /// multipart content type becomes a validation error too.
    pub async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, AppError> {
        let mut multipart = multipart
            .map_err(|e| AppError::validation(format!("Expected a multipart form: {}", e.body_text())))?;
        let mut parts = FormParts::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Malformed multipart body: {}", e.body_text())))?
        {
            let Some(name) = field.name().map(String::from) else {
                continue;
            };
            let filename = field.file_name().map(String::from);
            let content_type = field.content_type().map(String::from);

            match filename {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(|e| {
                        AppError::invalid_field(&name, format!("could not read upload: {}", e.body_text()))
                    })?;
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    parts.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        AppError::invalid_field(&name, format!("could not read field: {}", e.body_text()))
                    })?;
                    parts.texts.insert(name, text);
                }
            }
        }

        Ok(parts)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// Returns the text field, or `None` when missing or blank.
    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.texts.remove(name).filter(|t| !t.trim().is_empty())
    }

    /// Parses an optional unsigned integer field.
    pub fn take_u32(&mut self, name: &str) -> Result<Option<u32>, AppError> {
        match self.take_text(name) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| AppError::invalid_field(name, format!("'{}' is not a whole number", raw.trim()))),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub fn insert_text(&mut self, name: &str, value: &str) {
        self.texts.insert(name.to_string(), value.to_string());
    }
}
