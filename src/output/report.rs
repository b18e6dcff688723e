//! Scan report assembled from keyword matches and model output

use crate::input::file_detector::FileType;
use crate::llm::invoker::InferenceResult;
use crate::processing::keyword_matcher::MatchSet;
use crate::processing::similarity::SimilarityResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub source: PathBuf,
    pub file_type: FileType,
    pub word_count: usize,
    pub generated_at: DateTime<Utc>,
    /// Label of the model backend that ran, `none` when disabled
    pub backend: String,
    pub matches: MatchSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<InferenceResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<SimilarityResult>,
}

impl ScanReport {
    /// Wall-clock seconds spent in the model, if one ran
    pub fn model_duration_secs(&self) -> Option<f64> {
        self.inference
            .as_ref()
            .map(|result| result.duration_secs)
            .or_else(|| self.similarity.as_ref().map(|result| result.duration_secs))
    }

    pub fn total_matches(&self) -> usize {
        self.matches.total_count()
    }
}
