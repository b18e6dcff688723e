//! Model management for downloading and locating Hugging Face models

use crate::error::{Result, ScanError};
use hf_hub::api::tokio::Api;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Information about a model the scanner knows how to fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub repo_id: String,
    /// Files fetched from `repo_id`
    pub files: Vec<String>,
    /// Separate repo providing `tokenizer.json`, for GGUF repos that lack one
    pub tokenizer_repo: Option<String>,
    pub size_mb: u64,
    pub description: String,
    pub model_type: ModelType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    /// Quantized Llama-family weights for the local invoker
    QuantizedLlama,
    /// Model2Vec static embeddings for similarity matching
    StaticEmbedding,
}

impl ModelInfo {
    /// Main weights file, relative to the model directory
    pub fn weights_file(&self) -> &str {
        self.files.first().map(String::as_str).unwrap_or("")
    }

    fn required_files(&self) -> Vec<&str> {
        let mut required: Vec<&str> = self.files.iter().map(String::as_str).collect();
        if self.tokenizer_repo.is_some() {
            required.push(TOKENIZER_FILE);
        }
        required
    }
}

const TOKENIZER_FILE: &str = "tokenizer.json";

/// Weights and tokenizer for the local invoker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModelPaths {
    pub weights: PathBuf,
    pub tokenizer: PathBuf,
}

fn catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "llama-2-7b-chat-q2k".to_string(),
            name: "Llama-2-7B-Chat Q2_K".to_string(),
            repo_id: "TheBloke/Llama-2-7B-Chat-GGUF".to_string(),
            files: vec!["llama-2-7b-chat.Q2_K.gguf".to_string()],
            tokenizer_repo: Some("hf-internal-testing/llama-tokenizer".to_string()),
            size_mb: 2830,
            description: "2-bit quantized Llama 2 chat model, the default local analyzer"
                .to_string(),
            model_type: ModelType::QuantizedLlama,
        },
        ModelInfo {
            id: "tinyllama-q4".to_string(),
            name: "TinyLlama-1.1B-Chat Q4_K_M".to_string(),
            repo_id: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF".to_string(),
            files: vec!["tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf".to_string()],
            tokenizer_repo: Some("TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string()),
            size_mb: 670,
            description: "Small quantized chat model for resource-constrained machines"
                .to_string(),
            model_type: ModelType::QuantizedLlama,
        },
        ModelInfo {
            id: "minishlab/potion-base-8M".to_string(),
            name: "potion-base-8M".to_string(),
            repo_id: "minishlab/potion-base-8M".to_string(),
            files: vec![
                "config.json".to_string(),
                TOKENIZER_FILE.to_string(),
                "model.safetensors".to_string(),
            ],
            tokenizer_repo: None,
            size_mb: 30,
            description: "Model2Vec static embeddings for similarity matching".to_string(),
            model_type: ModelType::StaticEmbedding,
        },
    ]
}

/// Manager for models - handles download, caching, and selection
pub struct ModelManager {
    models_dir: PathBuf,
    available_models: Vec<ModelInfo>,
    downloaded_models: HashSet<String>,
}

impl ModelManager {
    pub async fn new(models_dir: PathBuf) -> Result<Self> {
        if !models_dir.exists() {
            fs::create_dir_all(&models_dir).await.map_err(|e| {
                ScanError::ModelError(format!("Failed to create models directory: {}", e))
            })?;
        }

        let mut manager = Self {
            models_dir,
            available_models: catalog(),
            downloaded_models: HashSet::new(),
        };
        manager.scan_downloaded_models().await;

        Ok(manager)
    }

    async fn scan_downloaded_models(&mut self) {
        for info in &self.available_models {
            let dir = self.models_dir.join(&info.id);
            if Self::has_all_files(&dir, &info.required_files()).await {
                debug!("Found downloaded model {}", info.id);
                self.downloaded_models.insert(info.id.clone());
            }
        }
    }

    async fn has_all_files(dir: &Path, files: &[&str]) -> bool {
        for file in files {
            if fs::metadata(dir.join(file)).await.is_err() {
                return false;
            }
        }
        true
    }

    /// Download a catalog model into `<models_dir>/<id>/`
    pub async fn download_model(&mut self, model_id: &str, force: bool) -> Result<PathBuf> {
        let model_info = self
            .get_model_info(model_id)
            .cloned()
            .ok_or_else(|| ScanError::ModelNotFound(format!("Unknown model: {}", model_id)))?;

        let model_dir = self.models_dir.join(&model_info.id);
        if !force && self.is_model_downloaded(model_id) {
            info!("Model {} already present at {}", model_id, model_dir.display());
            return Ok(model_dir);
        }

        info!(
            "Downloading model: {} ({} MB) from {}",
            model_info.name, model_info.size_mb, model_info.repo_id
        );

        fs::create_dir_all(&model_dir).await.map_err(|e| {
            ScanError::ModelError(format!("Failed to create model directory: {}", e))
        })?;

        let api = Api::new()
            .map_err(|e| ScanError::Network(format!("Failed to initialize HF API: {}", e)))?;

        let repo = api.model(model_info.repo_id.clone());
        for file in &model_info.files {
            let cached = repo.get(file).await.map_err(|e| {
                ScanError::Network(format!(
                    "Failed to download {} from {}: {}",
                    file, model_info.repo_id, e
                ))
            })?;
            Self::copy_into(&cached, &model_dir.join(file)).await?;
        }

        if let Some(tokenizer_repo) = &model_info.tokenizer_repo {
            let cached = api
                .model(tokenizer_repo.clone())
                .get(TOKENIZER_FILE)
                .await
                .map_err(|e| {
                    ScanError::Network(format!(
                        "Failed to download tokenizer from {}: {}",
                        tokenizer_repo, e
                    ))
                })?;
            Self::copy_into(&cached, &model_dir.join(TOKENIZER_FILE)).await?;
        }

        self.downloaded_models.insert(model_info.id.clone());
        info!("Model {} downloaded successfully", model_info.name);
        Ok(model_dir)
    }

    async fn copy_into(cached: &Path, dest: &Path) -> Result<()> {
        fs::copy(cached, dest).await.map_err(|e| {
            ScanError::ModelError(format!("Failed to copy {}: {}", dest.display(), e))
        })?;
        debug!("Stored {}", dest.display());
        Ok(())
    }

    pub async fn remove_model(&mut self, model_id: &str) -> Result<()> {
        if self.get_model_info(model_id).is_none() {
            return Err(ScanError::ModelNotFound(format!("Unknown model: {}", model_id)));
        }

        let model_dir = self.models_dir.join(model_id);
        if fs::metadata(&model_dir).await.is_err() {
            return Err(ScanError::ModelNotFound(format!(
                "Model {} is not downloaded",
                model_id
            )));
        }

        fs::remove_dir_all(&model_dir).await?;
        self.downloaded_models.remove(model_id);
        info!("Removed {}", model_dir.display());
        Ok(())
    }

    /// Resolve `--model` for the local invoker: a weights file path or a catalog id.
    ///
    /// A path uses the `tokenizer.json` next to it unless `tokenizer` is given.
    pub fn resolve_local_model(
        &self,
        model: &str,
        tokenizer: Option<&Path>,
    ) -> Result<LocalModelPaths> {
        let direct = PathBuf::from(model);
        if direct.is_file() {
            let tokenizer = match tokenizer {
                Some(path) => path.to_path_buf(),
                None => direct
                    .parent()
                    .map(|dir| dir.join(TOKENIZER_FILE))
                    .unwrap_or_else(|| PathBuf::from(TOKENIZER_FILE)),
            };
            if !tokenizer.is_file() {
                return Err(ScanError::ModelNotFound(format!(
                    "Tokenizer not found at {} (use --tokenizer)",
                    tokenizer.display()
                )));
            }
            return Ok(LocalModelPaths {
                weights: direct,
                tokenizer,
            });
        }

        let info = self
            .get_model_info(model)
            .filter(|info| info.model_type == ModelType::QuantizedLlama)
            .ok_or_else(|| {
                ScanError::ModelNotFound(format!(
                    "'{}' is neither a weights file nor a local model id",
                    model
                ))
            })?;

        if !self.is_model_downloaded(&info.id) {
            return Err(ScanError::ModelNotFound(format!(
                "Model {} is not downloaded; run `cta-scanner models download {}`",
                info.id, info.id
            )));
        }

        let dir = self.models_dir.join(&info.id);
        Ok(LocalModelPaths {
            weights: dir.join(info.weights_file()),
            tokenizer: tokenizer
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.join(TOKENIZER_FILE)),
        })
    }

    pub fn get_model_path(&self, model_id: &str) -> Option<PathBuf> {
        if self.downloaded_models.contains(model_id) {
            Some(self.models_dir.join(model_id))
        } else {
            None
        }
    }

    pub fn list_available_models(&self) -> Vec<&ModelInfo> {
        self.available_models.iter().collect()
    }

    pub fn list_downloaded_models(&self) -> Vec<String> {
        let mut downloaded: Vec<String> = self.downloaded_models.iter().cloned().collect();
        downloaded.sort();
        downloaded
    }

    pub fn get_model_info(&self, model_id: &str) -> Option<&ModelInfo> {
        self.available_models.iter().find(|info| info.id == model_id)
    }

    pub fn is_model_downloaded(&self, model_id: &str) -> bool {
        self.downloaded_models.contains(model_id)
    }
}
