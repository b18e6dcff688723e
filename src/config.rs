//! Configuration management for the CTA scanner

use crate::error::{Result, ScanError};
use crate::llm::invoker::InferenceConfig;
use crate::processing::keyword_matcher::MatchMode;
use crate::processing::phrases::{default_cta_table, PhraseEntry};
use crate::processing::synonyms::SynonymStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendKind,
    pub models: ModelConfig,
    pub local: LocalModelConfig,
    pub hosted: HostedModelConfig,
    pub similarity: SimilarityConfig,
    pub matching: MatchingConfig,
    pub output: OutputConfig,
}

/// Which model backend analyzes the document next to the keyword matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Hosted,
    Embedding,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    pub default_local_model: String,
    pub default_embedding_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// Overrides the tokenizer shipped next to the weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<PathBuf>,
    pub context_length: usize,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedModelConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API token
    pub api_key_env: String,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    pub threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub mode: MatchMode,
    pub synonyms: SynonymStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordnet_dir: Option<PathBuf>,
    pub phrases: Vec<PhraseEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        let models_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cta-scanner")
            .join("models");

        Self {
            backend: BackendKind::Local,
            models: ModelConfig {
                models_dir,
                default_local_model: "llama-2-7b-chat-q2k".to_string(),
                default_embedding_model: "minishlab/potion-base-8M".to_string(),
            },
            local: LocalModelConfig {
                tokenizer: None,
                context_length: 4096,
                inference: InferenceConfig::local_default(),
            },
            hosted: HostedModelConfig {
                base_url: "https://router.huggingface.co/v1".to_string(),
                model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
                api_key_env: "HF_TOKEN".to_string(),
                inference: InferenceConfig::hosted_default(),
            },
            similarity: SimilarityConfig { threshold: 0.8 },
            matching: MatchingConfig {
                mode: MatchMode::Substring,
                synonyms: SynonymStrategy::Static,
                wordnet_dir: None,
                phrases: default_cta_table().into_entries(),
            },
            output: OutputConfig {
                format: OutputFormat::Text,
                color_output: true,
            },
        }
    }
}

impl Config {
    /// Load the user config, writing the defaults on first use
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load an explicit config file; it must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScanError::Configuration(format!(
                "Config file does not exist: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ScanError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScanError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("cta-scanner")
            .join("config.toml")
    }

    pub fn models_dir(&self) -> &PathBuf {
        &self.models.models_dir
    }

    /// Reject values the scanner cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.similarity.threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ScanError::Configuration(format!(
                "similarity.threshold must be within [-1, 1], got {}",
                threshold
            )));
        }

        for inference in [&self.local.inference, &self.hosted.inference] {
            inference.validate()?;
        }

        // The context window only bounds the local model
        if self.backend == BackendKind::Local
            && self.local.context_length <= self.local.inference.max_tokens
        {
            return Err(ScanError::Configuration(format!(
                "local.context_length ({}) must exceed local.inference.max_tokens ({})",
                self.local.context_length, self.local.inference.max_tokens
            )));
        }

        if self.matching.phrases.iter().any(|entry| entry.phrase.trim().is_empty()) {
            return Err(ScanError::Configuration(
                "matching.phrases contains an empty phrase".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_literals() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.local.inference.max_tokens, 512);
        assert_eq!(config.local.inference.temperature, 0.1);
        assert_eq!(config.hosted.inference.temperature, 0.7);
        assert_eq!(config.local.inference.top_p, 0.9);
        assert_eq!(config.similarity.threshold, 0.8);
        assert_eq!(config.matching.mode, MatchMode::Substring);
        assert_eq!(config.matching.phrases.len(), 3);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.backend = BackendKind::Embedding;
        config.similarity.threshold = 0.65;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backend, BackendKind::Embedding);
        assert_eq!(loaded.similarity.threshold, 0.65);
        assert_eq!(loaded.matching.phrases[0].phrase, "buy");
        assert_eq!(
            loaded.matching.phrases[2].synonyms,
            vec!["buy now", "click here", "get yours"]
        );
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load_from(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ScanError::Configuration(_))));
    }

    #[test]
    fn test_context_window_only_checked_for_local_backend() {
        let mut config = Config::default();
        config.local.inference.max_tokens = config.local.context_length;
        assert!(matches!(config.validate(), Err(ScanError::Configuration(_))));

        config.backend = BackendKind::Hosted;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = Config::default();
        config.similarity.threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
