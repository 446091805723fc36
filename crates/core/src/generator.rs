//! TextGenerator trait — the abstraction over text-generation backends.
//!
//! A TextGenerator takes a fully rendered prompt string plus sampling
//! parameters and returns a raw continuation. It is stateless between calls;
//! non-determinism lives entirely in the backend's sampling.
//!
//! Implementations: OpenAI-compatible HTTP endpoints, local GGUF models.

use crate::error::GenerateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling hyperparameters passed through to the backend unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature (0.0 = deterministic, higher = more creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Penalty applied to already-generated tokens (vLLM/TGI extension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    /// Budget of newly generated tokens, never total sequence length
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_new_tokens() -> u32 {
    64
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: None,
            repetition_penalty: None,
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

/// A fully rendered generation request.
///
/// Derived per turn by a prompt strategy and consumed by the backend;
/// never stored in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The rendered prompt string the model should continue
    pub prompt: String,

    /// Sampling parameters
    pub params: SamplingParams,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

/// The raw continuation returned by a backend.
///
/// Transient — consumed by the postprocessor and then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Raw generated text; may echo the prompt or trail commentary
    pub text: String,
}

/// The core text-generation capability.
///
/// Every backend (HTTP endpoint, local model) implements this trait. The
/// session controller calls `generate()` without knowing which backend is
/// in use — pure polymorphism.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for this backend (e.g., "vllm", "local").
    fn name(&self) -> &str;

    /// Send a request and get the raw continuation.
    ///
    /// Backend unavailability, timeouts, and malformed or empty responses
    /// must surface as a [`GenerateError`] — never as a blank result.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResult, GenerateError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, GenerateError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults() {
        let params = SamplingParams::default();
        assert!((params.temperature - 0.8).abs() < f32::EPSILON);
        assert!(params.top_p.is_none());
        assert!(params.repetition_penalty.is_none());
        assert_eq!(params.max_new_tokens, 64);
    }

    #[test]
    fn sampling_params_deserialize_with_defaults() {
        let params: SamplingParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, SamplingParams::default());
    }

    #[test]
    fn request_serialization_skips_empty_stop() {
        let req = GenerationRequest {
            prompt: "文：おはよう".into(),
            params: SamplingParams::default(),
            stop: vec![],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("stop"));
        assert!(json.contains("文：おはよう"));
    }
}
