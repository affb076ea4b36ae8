//! Ollama Inference Backend
//!
//! Posts non-streaming requests to `<base_url>/api/generate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{BackendReply, InferenceBackend};
use crate::config::GatewayConfig;
use crate::constants::network;
use crate::router::DecodingOptions;
use crate::types::{ErrorCategory, ErrorClassifier, EscalatorError, LlmError, Result};

const BACKEND_NAME: &str = "ollama";

pub struct OllamaBackend {
    api_base: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let api_base = Self::validate_endpoint(&config.base_url)?;

        // The gateway enforces the per-call deadline; this one only stops
        // a stuck connection from outliving it
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.saturating_add(5)))
            .build()
            .map_err(|e| EscalatorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { api_base, client })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Only http/https; warns for endpoints off this machine
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            EscalatorError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(EscalatorError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
        {
            debug!(host, "Ollama endpoint is not local");
        }

        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    fn build_request<'a>(
        &self,
        model: &'a str,
        prompt: &'a str,
        options: &DecodingOptions,
    ) -> OllamaRequest<'a> {
        OllamaRequest {
            model,
            prompt,
            stream: false,
            options: backend_options(options),
        }
    }
}

/// Map decoding options onto Ollama's option names
fn backend_options(options: &DecodingOptions) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(t) = options.temperature {
        map.insert("temperature".to_string(), Value::from(t));
    }
    if let Some(p) = options.top_p {
        map.insert("top_p".to_string(), Value::from(p));
    }
    if let Some(n) = options.max_new_tokens {
        map.insert("num_predict".to_string(), Value::from(n));
    }
    for (key, value) in &options.extra {
        map.insert(key.clone(), value.clone());
    }
    map
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &DecodingOptions,
    ) -> std::result::Result<BackendReply, LlmError> {
        let url = format!("{}/api/generate", self.api_base);
        let request = self.build_request(model, prompt, options);

        debug!(model, "Sending request to Ollama API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = ErrorClassifier::classify_reqwest(&e, BACKEND_NAME);
                if e.is_connect() {
                    LlmError::with_backend(
                        err.category,
                        format!(
                            "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                            self.api_base
                        ),
                        BACKEND_NAME,
                    )
                } else {
                    err
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Ollama API error ({}): {}", status, body.trim()),
                BACKEND_NAME,
            ));
        }

        let request_id = response
            .headers()
            .get(network::REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let body: OllamaResponse = response.json().await.map_err(|e| {
            LlmError::with_backend(
                ErrorCategory::ParseError,
                format!("Failed to parse Ollama response: {}", e),
                BACKEND_NAME,
            )
        })?;

        Ok(BackendReply {
            text: body.response,
            request_id,
        })
    }

    fn name(&self) -> &str {
        BACKEND_NAME
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_default_endpoint() {
        let backend = OllamaBackend::new(&GatewayConfig::default()).unwrap();
        assert_eq!(backend.api_base(), "http://localhost:11434");
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config = GatewayConfig {
            base_url: "file:///etc/passwd".to_string(),
            ..Default::default()
        };
        let err = OllamaBackend::new(&config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_trailing_slash_removed() {
        let config = GatewayConfig {
            base_url: "http://gpu-box:11434/".to_string(),
            ..Default::default()
        };
        let backend = OllamaBackend::new(&config).unwrap();
        assert_eq!(backend.api_base(), "http://gpu-box:11434");
    }

    #[test]
    fn test_option_mapping() {
        let mut extra = BTreeMap::new();
        extra.insert("num_ctx".to_string(), Value::from(8192));
        let options = DecodingOptions {
            temperature: Some(0.5),
            top_p: None,
            max_new_tokens: Some(256),
            extra,
        };

        let map = backend_options(&options);
        assert_eq!(map.get("temperature"), Some(&Value::from(0.5f32)));
        assert_eq!(map.get("num_predict"), Some(&Value::from(256)));
        assert_eq!(map.get("num_ctx"), Some(&Value::from(8192)));
        assert!(!map.contains_key("top_p"));
        assert!(!map.contains_key("max_new_tokens"));
    }

    #[test]
    fn test_request_shape() {
        let backend = OllamaBackend::new(&GatewayConfig::default()).unwrap();
        let request = backend.build_request("qwen2.5:3b-instruct", "hi", &DecodingOptions::default());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen2.5:3b-instruct");
        assert_eq!(json["stream"], false);
        assert!(json["options"].as_object().unwrap().is_empty());
    }
}
