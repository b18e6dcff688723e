//! Embedding similarity matching of candidate phrases against a document

use crate::error::{Result, ScanError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Anything that turns text into a fixed-length vector
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str {
        "embedder"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub candidate: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub threshold: f32,
    pub matches: Vec<SimilarityMatch>,
    pub duration_secs: f64,
}

/// Cosine similarity clamped to [-1, 1].
///
/// Zero vectors score 0, bit-identical vectors score exactly 1.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ScanError::Processing(format!(
            "Embedding dimensions don't match: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    if a.is_empty() {
        return Ok(0.0);
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    if a == b {
        return Ok(1.0);
    }

    Ok((dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Keep the candidates whose embedding is closer to the text than `threshold`.
///
/// The comparison is strict, except that a perfect score of 1.0 is always
/// kept so a threshold of 1.0 still admits identical embeddings.
pub fn match_by_similarity<S: AsRef<str>>(
    text: &str,
    candidates: &[S],
    embedder: &dyn Embedder,
    threshold: f32,
) -> Result<SimilarityResult> {
    let start_time = Instant::now();
    let text_embedding = embedder.embed(text)?;

    let mut matches = Vec::new();
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let embedding = embedder.embed(candidate)?;
        let similarity = cosine_similarity(&text_embedding, &embedding)?;
        debug!("similarity('{}') = {:.4}", candidate, similarity);

        if similarity > threshold || similarity >= 1.0 {
            matches.push(SimilarityMatch {
                candidate: candidate.to_string(),
                similarity,
            });
        }
    }

    Ok(SimilarityResult {
        threshold,
        matches,
        duration_secs: start_time.elapsed().as_secs_f64(),
    })
}
