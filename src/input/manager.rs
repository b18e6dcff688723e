//! Input manager for handling different file types

use crate::error::{Result, ScanError};
use crate::input::file_detector::FileType;
use crate::input::text_extractor::{
    DocxExtractor, PdfExtractor, PlainTextExtractor, RawBytesExtractor, TextExtractor,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use unicode_segmentation::UnicodeSegmentation;

/// Text pulled out of one input document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub path: PathBuf,
    pub file_type: FileType,
    pub text: String,
}

impl ExtractedDocument {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.unicode_words().count()
    }
}

#[derive(Debug, Default)]
pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        Self
    }

    /// `FileNotFound` unless `path` exists
    pub fn ensure_exists(path: &Path) -> Result<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(ScanError::FileNotFound(path.to_path_buf()))
        }
    }

    pub async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        Self::ensure_exists(path)?;

        let file_type = FileType::from_path(path);

        let text = match file_type {
            FileType::PlainText => {
                info!("Reading plain text file: {}", path.display());
                PlainTextExtractor.extract(path).await?
            }
            FileType::Pdf => {
                info!("Extracting text from PDF: {}", path.display());
                PdfExtractor.extract(path).await?
            }
            FileType::Docx => {
                info!("Extracting text from DOCX: {}", path.display());
                DocxExtractor.extract(path).await?
            }
            FileType::Unknown => RawBytesExtractor.extract(path).await?,
        };

        Ok(ExtractedDocument {
            path: path.to_path_buf(),
            file_type,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.pdf");

        let err = InputManager::new().extract(&missing).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, ScanError::FileNotFound(p) if p == missing));
    }

    #[tokio::test]
    async fn test_plain_text_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("transcription.txt");
        std::fs::write(&path, "Please buy now.").unwrap();

        let document = InputManager::new().extract(&path).await.unwrap();
        assert_eq!(document.file_type, FileType::PlainText);
        assert_eq!(document.text, "Please buy now.");
        assert_eq!(document.char_count(), 15);
        assert_eq!(document.word_count(), 3);
    }

    #[tokio::test]
    async fn test_extensionless_file_falls_back_to_raw_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("NOTES");
        std::fs::write(&path, "subscribe today").unwrap();

        let document = InputManager::new().extract(&path).await.unwrap();
        assert_eq!(document.file_type, FileType::Unknown);
        assert_eq!(document.text, "subscribe today");
    }
}
