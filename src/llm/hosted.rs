//! Hosted instruction-tuned model behind an OpenAI-compatible chat endpoint

use crate::config::HostedModelConfig;
use crate::error::{Result, ScanError};
use crate::llm::invoker::{InferenceConfig, InferenceResult, ModelInvoker};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Instant;

pub struct HostedInvoker {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HostedInvoker {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        }
    }

    /// Read the token from the environment variable the config names
    pub fn from_config(config: &HostedModelConfig, model: Option<&str>) -> Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => None,
        };

        if api_key.is_none() && !is_local_endpoint(&config.base_url) {
            return Err(ScanError::Configuration(format!(
                "Hosted backend needs an API token in ${}",
                config.api_key_env
            )));
        }

        Ok(Self::new(
            &config.base_url,
            model.unwrap_or(&config.model),
            api_key,
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn is_local_endpoint(base_url: &str) -> bool {
    let host = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split(['/', ':'])
        .next()
        .unwrap_or("");
    matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0")
}

/// Single-message chat completion request
pub fn build_request_body(model: &str, prompt: &str, config: &InferenceConfig) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "top_p": config.top_p,
        "stream": false,
    });

    if let Some(seed) = config.seed {
        body["seed"] = json!(seed);
    }

    body
}

/// Generated text and completion token count of a chat completion response
pub fn parse_completion(body: &Value) -> Result<(String, usize)> {
    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            ScanError::LlmInference(format!(
                "Response has no choices[0].message.content: {}",
                body
            ))
        })?
        .to_string();

    let token_count = body["usage"]["completion_tokens"]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or_else(|| text.split_whitespace().count());

    Ok((text, token_count))
}

#[async_trait]
impl ModelInvoker for HostedInvoker {
    fn name(&self) -> &str {
        &self.model
    }

    async fn infer(&mut self, prompt: &str, config: &InferenceConfig) -> Result<InferenceResult> {
        let start_time = Instant::now();
        let body = build_request_body(&self.model, prompt, config);

        info!("Requesting completion from {} ({})", self.endpoint, self.model);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Network(format!("API error {}: {}", status, body)));
        }

        let payload: Value = response.json().await?;
        let (text, token_count) = parse_completion(&payload)?;

        let duration_secs = start_time.elapsed().as_secs_f64();
        debug!("Hosted completion took {:.2}s", duration_secs);

        Ok(InferenceResult {
            text,
            duration_secs,
            token_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let config = InferenceConfig::hosted_default();
        let body = build_request_body("mistralai/Mistral-7B-Instruct-v0.2", "Analyze this", &config);

        assert_eq!(body["model"], "mistralai/Mistral-7B-Instruct-v0.2");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Analyze this");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["top_p"], 0.9);
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn test_request_body_includes_seed() {
        let config = InferenceConfig {
            seed: Some(42),
            ..InferenceConfig::hosted_default()
        };
        let body = build_request_body("m", "p", &config);
        assert_eq!(body["seed"], 42);
    }

    #[test]
    fn test_parse_completion() {
        let payload = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Found: buy now"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 5}
        });
        let (text, tokens) = parse_completion(&payload).unwrap();
        assert_eq!(text, "Found: buy now");
        assert_eq!(tokens, 5);
    }

    #[test]
    fn test_parse_completion_without_usage_counts_words() {
        let payload = json!({"choices": [{"message": {"content": "one two three"}}]});
        assert_eq!(parse_completion(&payload).unwrap().1, 3);
    }

    #[test]
    fn test_parse_completion_rejects_error_payload() {
        let payload = json!({"error": "model is loading"});
        assert!(matches!(
            parse_completion(&payload),
            Err(ScanError::LlmInference(_))
        ));
    }

    #[test]
    fn test_endpoint_and_local_detection() {
        let invoker = HostedInvoker::new("http://localhost:8080/v1/", "m", None);
        assert_eq!(invoker.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert!(is_local_endpoint("http://localhost:8080/v1"));
        assert!(!is_local_endpoint("https://router.huggingface.co/v1"));
    }

    #[test]
    fn test_missing_token_for_remote_endpoint() {
        let config = HostedModelConfig {
            base_url: "https://router.huggingface.co/v1".to_string(),
            model: "m".to_string(),
            api_key_env: "CTA_SCANNER_TEST_UNSET_TOKEN".to_string(),
            inference: InferenceConfig::hosted_default(),
        };
        assert!(matches!(
            HostedInvoker::from_config(&config, None),
            Err(ScanError::Configuration(_))
        ));
    }
}
