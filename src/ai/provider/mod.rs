//! Inference Backend Abstraction
//!
//! Defines the [`InferenceBackend`] trait: one opaque
//! `generate(model, prompt, options)` call returning raw text. Retry,
//! timeout and backoff policy live in the gateway, not here.

mod ollama;

pub use ollama::OllamaBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::router::DecodingOptions;
use crate::types::{LlmError, Result};

/// Raw reply from one backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub text: String,
    /// Correlation id reported by the backend, or generated locally
    pub request_id: String,
}

/// Shared backend for concurrent candidate generation
pub type SharedBackend = Arc<dyn InferenceBackend>;

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Generate a completion for `prompt` with the backend model `model`.
    ///
    /// Latency is unbounded; callers apply their own timeout.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &DecodingOptions,
    ) -> std::result::Result<BackendReply, LlmError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Create the backend described by the gateway configuration
pub fn create_backend(config: &GatewayConfig) -> Result<SharedBackend> {
    Ok(Arc::new(OllamaBackend::new(config)?))
}
