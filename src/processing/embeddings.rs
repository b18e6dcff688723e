//! Embeddings generation using Model2Vec

use crate::config::Config;
use crate::error::{Result, ScanError};
use crate::processing::similarity::Embedder;
use log::info;
use model2vec_rs::model::StaticModel;
use std::path::PathBuf;
use std::time::Instant;

/// Caller-owned handle on a loaded static embedding model
pub struct EmbeddingEngine {
    model: StaticModel,
    model_name: String,
}

impl EmbeddingEngine {
    /// Load from a local model folder or a HuggingFace repo id
    pub fn load(repo_or_path: &str) -> Result<Self> {
        let start_time = Instant::now();

        info!("Loading Model2Vec embedding model from: {}", repo_or_path);

        let model = StaticModel::from_pretrained(
            repo_or_path,
            None, // token
            None, // normalize
            None, // subfolder
        )
        .map_err(|e| ScanError::Embedding(format!("Failed to load model: {}", e)))?;

        info!("Embedding model loaded in {:.2?}", start_time.elapsed());

        Ok(Self {
            model,
            model_name: repo_or_path.to_string(),
        })
    }

    /// Load the configured model, preferring a copy under the models directory
    pub fn from_config(config: &Config, model: Option<&str>) -> Result<Self> {
        let name = model.unwrap_or(&config.models.default_embedding_model);
        let location = Self::resolve_model_location(config, name);
        Self::load(&location)
    }

    fn resolve_model_location(config: &Config, name: &str) -> String {
        let direct = PathBuf::from(name);
        if direct.exists() {
            return name.to_string();
        }

        let local_path = config.models_dir().join(name);
        if local_path.exists() {
            return local_path.to_string_lossy().to_string();
        }

        name.to_string()
    }
}

impl Embedder for EmbeddingEngine {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.model.encode_single(text);
        if embedding.is_empty() {
            return Err(ScanError::Embedding(format!(
                "Model {} returned an empty embedding",
                self.model_name
            )));
        }
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
