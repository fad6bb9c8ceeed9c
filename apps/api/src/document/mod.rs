//! Résumé text extraction for PDF, DOCX and legacy DOC uploads.

pub mod extractor;
pub mod formats;
pub mod handlers;

#[cfg(test)]
pub mod fixtures;

pub use extractor::DocumentExtractor;
