//! OpenAI-compatible completion backend.
//!
//! Works with: vLLM, Ollama, llama.cpp server, Together AI, Fireworks AI,
//! and any endpoint exposing the OpenAI `/v1/completions` surface.
//!
//! The legacy completions endpoint (not chat completions) is the right fit
//! here: the prompt strategies hand over a fully rendered prompt string and
//! expect a raw continuation back.

use async_trait::async_trait;
use ojisan_core::error::GenerateError;
use ojisan_core::generator::{GenerationRequest, GenerationResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A text-generation backend speaking the OpenAI completions protocol.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Create a vLLM backend (convenience constructor).
    pub fn vllm(model: impl Into<String>) -> Self {
        Self::new("vllm", "http://localhost:8000/v1", "EMPTY", model)
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    fn to_api_request(&self, request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            repetition_penalty: request.params.repetition_penalty,
            max_tokens: request.params.max_new_tokens,
            stop: request.stop.clone(),
            stream: false,
        }
    }
}

#[async_trait]
impl ojisan_core::TextGenerator for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResult, GenerateError> {
        let url = format!("{}/completions", self.base_url);
        let body = self.to_api_request(&request);

        debug!(
            backend = %self.name,
            model = %self.model,
            prompt_chars = request.prompt.chars().count(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout(e.to_string())
                } else {
                    GenerateError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GenerateError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(GenerateError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(GenerateError::ModelNotFound(self.model.clone()));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(GenerateError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GenerateError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerateError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        if choice.text.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }

        Ok(GenerationResult { text: choice.text })
    }

    async fn health_check(&self) -> std::result::Result<bool, GenerateError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| GenerateError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    prompt: String,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    /// vLLM/TGI extension field; omitted for servers that reject it
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ojisan_core::{SamplingParams, TextGenerator};

    fn request_with(params: SamplingParams, stop: Vec<String>) -> GenerationRequest {
        GenerationRequest {
            prompt: "文：おはよう\n\nおじさん構文：".into(),
            params,
            stop,
        }
    }

    #[test]
    fn vllm_constructor() {
        let backend = OpenAiCompatBackend::vllm("Qwen/Qwen3-4B-Instruct-2507");
        assert_eq!(backend.name(), "vllm");
        assert!(backend.base_url.contains("localhost:8000"));
    }

    #[test]
    fn ollama_constructor() {
        let backend = OpenAiCompatBackend::ollama(None, "qwen3:4b");
        assert_eq!(backend.name(), "ollama");
        assert!(backend.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = OpenAiCompatBackend::new("x", "http://host/v1/", "k", "m");
        assert_eq!(backend.base_url, "http://host/v1");
    }

    #[test]
    fn api_request_serializes_full_sampling_tuple() {
        let backend = OpenAiCompatBackend::vllm("qwen");
        let req = request_with(
            SamplingParams {
                temperature: 0.8,
                top_p: Some(0.92),
                repetition_penalty: Some(1.25),
                max_new_tokens: 64,
            },
            vec!["<|im_end|>".into()],
        );
        let json = serde_json::to_value(backend.to_api_request(&req)).unwrap();
        assert_eq!(json["temperature"], 0.8);
        assert_eq!(json["top_p"], 0.92);
        assert_eq!(json["repetition_penalty"], 1.25);
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["stop"][0], "<|im_end|>");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn api_request_omits_unset_sampling_fields() {
        let backend = OpenAiCompatBackend::vllm("qwen");
        let req = request_with(
            SamplingParams {
                temperature: 0.8,
                top_p: None,
                repetition_penalty: None,
                max_new_tokens: 96,
            },
            vec![],
        );
        let json = serde_json::to_value(backend.to_api_request(&req)).unwrap();
        assert!(json.get("top_p").is_none());
        assert!(json.get("repetition_penalty").is_none());
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{"id":"cmpl-1","object":"text_completion","model":"qwen",
            "choices":[{"text":"ヤッホー💕","index":0,"finish_reason":"stop"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].text, "ヤッホー💕");
    }

    #[test]
    fn parse_response_without_choices() {
        let data = r#"{"id":"cmpl-2","object":"text_completion","choices":[]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
