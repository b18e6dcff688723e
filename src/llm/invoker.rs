//! The swappable model boundary seen by the scan pipeline

use crate::error::{Result, ScanError};
use crate::processing::similarity::Embedder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            seed: None,
        }
    }
}

impl InferenceConfig {
    /// Near-greedy sampling for the local quantized model
    pub fn local_default() -> Self {
        Self {
            temperature: 0.1,
            ..Self::default()
        }
    }

    pub fn hosted_default() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(ScanError::Configuration(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ScanError::Configuration(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ScanError::Configuration(format!(
                "top_p must be within (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// Result of LLM inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub text: String,
    /// Wall-clock seconds around the model call
    pub duration_secs: f64,
    pub token_count: usize,
}

#[async_trait]
pub trait ModelInvoker: Send {
    fn name(&self) -> &str;

    async fn infer(&mut self, prompt: &str, config: &InferenceConfig) -> Result<InferenceResult>;
}

/// What the pipeline does with the document after keyword matching
pub enum ModelBackend {
    /// Send the rendered prompt to a text-generating model
    Generative(Box<dyn ModelInvoker>, InferenceConfig),
    /// Score every candidate phrase against the document embedding
    Embedding {
        embedder: Box<dyn Embedder>,
        threshold: f32,
    },
    Disabled,
}

impl ModelBackend {
    pub fn label(&self) -> String {
        match self {
            ModelBackend::Generative(invoker, _) => invoker.name().to_string(),
            ModelBackend::Embedding { embedder, .. } => {
                format!("embedding:{}", embedder.model_name())
            }
            ModelBackend::Disabled => "none".to_string(),
        }
    }
}

impl std::fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelBackend::Generative(invoker, config) => f
                .debug_tuple("Generative")
                .field(&invoker.name())
                .field(config)
                .finish(),
            ModelBackend::Embedding { embedder, threshold } => f
                .debug_struct("Embedding")
                .field("embedder", &embedder.model_name())
                .field("threshold", threshold)
                .finish(),
            ModelBackend::Disabled => f.write_str("Disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_config_defaults() {
        let local = InferenceConfig::local_default();
        assert_eq!(local.max_tokens, 512);
        assert_eq!(local.temperature, 0.1);
        assert_eq!(local.top_p, 0.9);

        let hosted = InferenceConfig::hosted_default();
        assert_eq!(hosted.temperature, 0.7);
        assert!(hosted.validate().is_ok());
    }

    #[test]
    fn test_inference_config_validation() {
        let mut config = InferenceConfig::default();
        config.top_p = 0.0;
        assert!(config.validate().is_err());

        config.top_p = 1.0;
        config.max_tokens = 0;
        assert!(config.validate().is_err());

        config.max_tokens = 16;
        config.temperature = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_label() {
        assert_eq!(ModelBackend::Disabled.label(), "none");
    }
}
