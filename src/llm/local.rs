//! Local quantized Llama inference using Candle

use crate::error::{Result, ScanError};
use crate::llm::invoker::{InferenceConfig, InferenceResult, ModelInvoker};
use async_trait::async_trait;
use candle_core::quantized::{ggml_file, gguf_file};
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;

/// Environment variable that forces the inference device
pub const DEVICE_ENV_VAR: &str = "CTA_SCANNER_DEVICE";

const DEFAULT_SEED: u64 = 299_792_458;

/// End-of-sequence ids of common Llama-family tokenizers, used when the
/// tokenizer does not name `</s>`
const FALLBACK_EOS_TOKENS: [u32; 5] = [2, 32000, 32007, 128001, 128009];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" | "mps" => Ok(DevicePreference::Metal),
            other => Err(format!("Unknown device '{}'", other)),
        }
    }
}

/// Get the best available device for inference (GPU if available, CPU fallback)
pub fn get_best_device() -> Result<Device> {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA GPU for inference");
            return Ok(device);
        }
    }

    if cfg!(target_os = "macos") {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal GPU for inference");
                return Ok(device);
            }
            Err(e) => warn!("Metal GPU initialization failed: {}", e),
        }
    }

    info!("No GPU available, using CPU");
    Ok(Device::Cpu)
}

/// Get device with optional user override from `CTA_SCANNER_DEVICE`
pub fn get_device_with_override() -> Result<Device> {
    let preference = match std::env::var(DEVICE_ENV_VAR) {
        Ok(value) => match value.parse::<DevicePreference>() {
            Ok(preference) => preference,
            Err(e) => {
                warn!("{}, falling back to auto-detection", e);
                return get_best_device();
            }
        },
        Err(_) => return get_best_device(),
    };

    info!("Forcing {:?} device (from {})", preference, DEVICE_ENV_VAR);
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Cuda => {
            #[cfg(feature = "cuda")]
            {
                return Device::new_cuda(0).map_err(|e| {
                    ScanError::ModelError(format!("Failed to initialize CUDA: {}", e))
                });
            }
            #[cfg(not(feature = "cuda"))]
            {
                return Err(ScanError::ModelError(
                    "CUDA support not compiled in".to_string(),
                ));
            }
        }
        DevicePreference::Metal => {
            #[cfg(feature = "metal")]
            {
                return Device::new_metal(0).map_err(|e| {
                    ScanError::ModelError(format!("Failed to initialize Metal: {}", e))
                });
            }
            #[cfg(not(feature = "metal"))]
            {
                return Err(ScanError::ModelError(
                    "Metal support not compiled in".to_string(),
                ));
            }
        }
    }
}

/// Error unless the prompt leaves room for `max_tokens` new tokens
pub fn check_context_window(
    prompt_tokens: usize,
    max_tokens: usize,
    context_length: usize,
) -> Result<()> {
    if prompt_tokens + max_tokens > context_length {
        return Err(ScanError::LlmInference(format!(
            "Prompt of {} tokens plus {} new tokens exceeds the {}-token context window",
            prompt_tokens, max_tokens, context_length
        )));
    }
    Ok(())
}

/// Quantized Llama weights plus tokenizer, loaded once and owned by the caller
pub struct LocalInvoker {
    model: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token: Option<u32>,
    context_length: usize,
    name: String,
}

impl LocalInvoker {
    /// Load GGUF weights, or legacy GGML weights from a `.bin` file
    pub fn load(weights_path: &Path, tokenizer_path: &Path, context_length: usize) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading local model from: {}", weights_path.display());

        let device = get_device_with_override()?;
        let mut file = std::fs::File::open(weights_path).map_err(|e| {
            ScanError::ModelLoading(format!("Failed to open {}: {}", weights_path.display(), e))
        })?;

        let is_ggml = weights_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_lowercase().as_str(), "bin" | "ggml"))
            .unwrap_or(false);

        let weights = if is_ggml {
            let content = ggml_file::Content::read(&mut file, &device).map_err(|e| {
                ScanError::ModelLoading(format!("Invalid GGML file: {}", e))
            })?;
            ModelWeights::from_ggml(content, 1)
        } else {
            let content = gguf_file::Content::read(&mut file).map_err(|e| {
                ScanError::ModelLoading(format!("Invalid GGUF file: {}", e))
            })?;
            ModelWeights::from_gguf(content, &mut file, &device)
        };
        let model = weights
            .map_err(|e| ScanError::ModelLoading(format!("Failed to build model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            ScanError::ModelLoading(format!(
                "Failed to load tokenizer {}: {}",
                tokenizer_path.display(),
                e
            ))
        })?;
        let eos_token = tokenizer.token_to_id("</s>");

        let name = weights_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "local".to_string());

        info!("Local model {} loaded in {:.2?}", name, start_time.elapsed());

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token,
            context_length,
            name,
        })
    }

    fn is_eos_token(&self, token: u32) -> bool {
        match self.eos_token {
            Some(eos) => token == eos,
            None => FALLBACK_EOS_TOKENS.contains(&token),
        }
    }

    fn next_token(&mut self, input: &[u32], index_pos: usize, sampler: &mut LogitsProcessor) -> Result<u32> {
        let input = Tensor::new(input, &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input, index_pos)?.squeeze(0)?;
        Ok(sampler.sample(&logits)?)
    }
}

#[async_trait]
impl ModelInvoker for LocalInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&mut self, prompt: &str, config: &InferenceConfig) -> Result<InferenceResult> {
        let start_time = Instant::now();

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ScanError::LlmInference(format!("Failed to tokenize input: {}", e)))?;
        let prompt_tokens = encoding.get_ids().to_vec();
        check_context_window(prompt_tokens.len(), config.max_tokens, self.context_length)?;
        debug!("Prompt tokenized into {} tokens", prompt_tokens.len());

        let mut sampler = LogitsProcessor::new(
            config.seed.unwrap_or(DEFAULT_SEED),
            Some(config.temperature),
            Some(config.top_p),
        );

        // The whole prompt goes through in one pass, then one token per step
        let mut generated = Vec::with_capacity(config.max_tokens);
        let mut next = self.next_token(&prompt_tokens, 0, &mut sampler)?;

        while !self.is_eos_token(next) {
            generated.push(next);
            if generated.len() >= config.max_tokens {
                break;
            }
            let index_pos = prompt_tokens.len() + generated.len() - 1;
            next = self.next_token(&[next], index_pos, &mut sampler)?;
        }

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| ScanError::LlmInference(format!("Failed to decode output: {}", e)))?;

        let duration_secs = start_time.elapsed().as_secs_f64();
        debug!(
            "Generated {} tokens in {:.2}s",
            generated.len(),
            duration_secs
        );

        Ok(InferenceResult {
            text: text.trim().to_string(),
            duration_secs,
            token_count: generated.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_window_check() {
        assert!(check_context_window(100, 512, 4096).is_ok());
        assert!(check_context_window(3584, 512, 4096).is_ok());
        assert!(matches!(
            check_context_window(3585, 512, 4096),
            Err(ScanError::LlmInference(_))
        ));
    }

    #[test]
    fn test_device_preference_parsing() {
        assert_eq!("CPU".parse::<DevicePreference>(), Ok(DevicePreference::Cpu));
        assert_eq!("cuda".parse::<DevicePreference>(), Ok(DevicePreference::Cuda));
        assert_eq!(" metal ".parse::<DevicePreference>(), Ok(DevicePreference::Metal));
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_load_missing_weights() {
        let temp_dir = TempDir::new().unwrap();
        let result = LocalInvoker::load(
            &temp_dir.path().join("model.gguf"),
            &temp_dir.path().join("tokenizer.json"),
            4096,
        );
        assert!(matches!(result, Err(ScanError::ModelLoading(_))));
    }

    #[test]
    fn test_load_rejects_garbage_gguf() {
        let temp_dir = TempDir::new().unwrap();
        let weights = temp_dir.path().join("model.gguf");
        std::fs::write(&weights, b"definitely not gguf").unwrap();

        let result = LocalInvoker::load(&weights, &temp_dir.path().join("tokenizer.json"), 4096);
        assert!(matches!(result, Err(ScanError::ModelLoading(_))));
    }
}
