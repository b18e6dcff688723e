//! Error handling for the CTA scanner

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("DOCX extraction error: {0}")]
    DocxExtraction(String),

    #[error("Thesaurus lookup error: {0}")]
    Thesaurus(String),

    #[error("Embedding generation error: {0}")]
    Embedding(String),

    #[error("LLM inference error: {0}")]
    LlmInference(String),

    #[error("Model loading error: {0}")]
    ModelLoading(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl ScanError {
    /// True for the missing-input condition, which callers report separately
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScanError::FileNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Convert anyhow errors to our custom error type
impl From<anyhow::Error> for ScanError {
    fn from(err: anyhow::Error) -> Self {
        ScanError::Processing(err.to_string())
    }
}

/// Convert candle core errors to our custom error type
impl From<candle_core::Error> for ScanError {
    fn from(err: candle_core::Error) -> Self {
        ScanError::ModelError(err.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_names_path() {
        let err = ScanError::FileNotFound(PathBuf::from("transcription.txt"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "File not found: transcription.txt");
    }

    #[test]
    fn test_io_error_is_not_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: ScanError = io.into();
        assert!(!err.is_not_found());
    }
}
