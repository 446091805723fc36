//! Local inference backend — runs the persona model in-process.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to
//! run GGUF-quantized Qwen-family models with zero internet after the first
//! download, zero API keys, zero cost.
//!
//! The model is loaded lazily on the first request and then reused
//! read-only for the lifetime of the process — there is no reload path.
//! Prompts arrive fully rendered from the prompt strategies; this backend
//! only tokenizes, samples, and decodes.
//!
//! # Example
//! ```bash
//! ojisan chat --local --model qwen3:4b
//! ojisan chat --local --model /path/to/model.gguf
//! ```

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_qwen2 as qwen;
use candle_transformers::utils::apply_repeat_penalty;
use hf_hub::api::sync::Api;
use ojisan_core::error::GenerateError;
use ojisan_core::generator::{GenerationRequest, GenerationResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens of recent context considered by the repetition penalty.
const REPEAT_LAST_N: usize = 64;

// ── Well-known model aliases ───────────────────────────────────────────

/// Model presets — friendly aliases that resolve to HuggingFace repos +
/// filenames. All presets are ChatML-speaking Qwen instruct models.
struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    match alias.to_lowercase().as_str() {
        "qwen3:4b" | "qwen3-4b" | "qwen3" => Some(ModelPreset {
            repo: "Qwen/Qwen3-4B-Instruct-2507-GGUF",
            gguf_file: "Qwen3-4B-Instruct-2507-Q4_K_M.gguf",
            tokenizer_repo: "Qwen/Qwen3-4B-Instruct-2507",
        }),
        "qwen2.5:0.5b" | "qwen2.5-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2.5-0.5B-Instruct-GGUF",
            gguf_file: "qwen2.5-0.5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2.5-0.5B-Instruct",
        }),
        "qwen2.5:1.5b" | "qwen2.5-1.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2.5-1.5B-Instruct-GGUF",
            gguf_file: "qwen2.5-1.5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2.5-1.5B-Instruct",
        }),
        _ => None,
    }
}

// ── Local backend ──────────────────────────────────────────────────────

/// A backend that runs GGUF-quantized Qwen models locally via Candle.
///
/// Thread-safe: the model is behind a Mutex because Candle inference is
/// inherently single-threaded (CPU tensor ops). The `Option` is the
/// init-once latch — `None` until the first request, `Some` forever after.
pub struct LocalBackend {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    model_name: String,
}

/// The loaded model state (tokenizer + weights + device).
struct LocalModelState {
    model: qwen::ModelWeights,
    tokenizer: tokenizers::Tokenizer,
    device: Device,
    eos_token_id: u32,
}

impl LocalBackend {
    /// Create a new local backend.
    ///
    /// `model_name` can be:
    /// - A preset alias: `"qwen3:4b"`, `"qwen2.5:0.5b"`, `"qwen2.5:1.5b"`
    /// - A path to a local GGUF file: `"/path/to/model.gguf"`
    ///
    /// The model is loaded lazily on the first request.
    pub fn new(model_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            model_name: model_name.to_string(),
        }
    }

    /// Eagerly load the model (downloads if needed, then loads into memory).
    pub fn load(model_name: &str) -> Result<Self, GenerateError> {
        let state = LocalModelState::load(model_name)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(state))),
            model_name: model_name.to_string(),
        })
    }
}

impl LocalModelState {
    /// Load a model by preset alias or GGUF path.
    fn load(model_name: &str) -> Result<Self, GenerateError> {
        let device = Device::Cpu;

        let (model_path, tokenizer_path) =
            if Path::new(model_name).exists() && model_name.ends_with(".gguf") {
                let path = Path::new(model_name).to_path_buf();
                let tokenizer = path.with_file_name("tokenizer.json");
                if !tokenizer.exists() {
                    return Err(GenerateError::NotConfigured(format!(
                        "No tokenizer.json next to '{}'",
                        path.display()
                    )));
                }
                (path, tokenizer)
            } else {
                let preset = resolve_preset(model_name).ok_or_else(|| {
                    GenerateError::ModelNotFound(format!(
                        "Unknown local model '{model_name}'. Available presets: qwen3:4b, \
                         qwen2.5:0.5b, qwen2.5:1.5b. Or provide a path to a .gguf file."
                    ))
                })?;

                info!(
                    model = model_name,
                    repo = preset.repo,
                    file = preset.gguf_file,
                    "Downloading/loading local model"
                );

                // Download via HuggingFace Hub (cached automatically)
                let api = Api::new().map_err(|e| {
                    GenerateError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
                })?;

                let model_path = api
                    .model(preset.repo.to_string())
                    .get(preset.gguf_file)
                    .map_err(|e| {
                        GenerateError::Network(format!(
                            "Failed to download model '{}' from '{}': {e}",
                            preset.gguf_file, preset.repo
                        ))
                    })?;

                let tokenizer_path = api
                    .model(preset.tokenizer_repo.to_string())
                    .get("tokenizer.json")
                    .map_err(|e| {
                        GenerateError::Network(format!(
                            "Failed to download tokenizer from '{}': {e}",
                            preset.tokenizer_repo
                        ))
                    })?;

                (model_path, tokenizer_path)
            };

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| GenerateError::NotConfigured(format!("Failed to load tokenizer: {e}")))?;

        let mut file = std::fs::File::open(&model_path)
            .map_err(|e| GenerateError::NotConfigured(format!("Failed to open model file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| GenerateError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;

        let model = qwen::ModelWeights::from_gguf(gguf, &mut file, &device).map_err(|e| {
            GenerateError::NotConfigured(format!("Failed to load model weights: {e}"))
        })?;

        // ChatML end-of-turn doubles as EOS for the Qwen family
        let eos_token_id = tokenizer
            .token_to_id("<|im_end|>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .ok_or_else(|| {
                GenerateError::NotConfigured("Tokenizer has no ChatML end token".into())
            })?;

        info!(eos_token_id, "Local model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token_id,
        })
    }

    /// Run inference: tokenize → sample new tokens → decode the new tokens.
    ///
    /// Only newly generated tokens are decoded, so the returned text never
    /// echoes the prompt. The budget is strictly new tokens.
    fn generate(&mut self, request: &GenerationRequest) -> Result<String, GenerateError> {
        let params = &request.params;

        let encoding = self
            .tokenizer
            .encode(request.prompt.as_str(), true)
            .map_err(|e| GenerateError::ApiError {
                status_code: 500,
                message: format!("Tokenization failed: {e}"),
            })?;

        let prompt_tokens = encoding.get_ids();

        debug!(
            prompt_tokens = prompt_tokens.len(),
            max_new_tokens = params.max_new_tokens,
            temperature = params.temperature,
            "Starting local generation"
        );

        let mut logits_processor = if params.temperature <= 0.0 {
            LogitsProcessor::new(42, None, None)
        } else {
            LogitsProcessor::new(
                42,
                Some(params.temperature as f64),
                params.top_p.map(f64::from),
            )
        };

        let mut input_ids = Tensor::new(prompt_tokens, &self.device)
            .map_err(map_candle_err)?
            .unsqueeze(0)
            .map_err(map_candle_err)?;

        let mut generated_tokens: Vec<u32> = Vec::new();

        for _ in 0..params.max_new_tokens {
            let logits = self
                .model
                .forward(&input_ids, generated_tokens.len())
                .map_err(map_candle_err)?;

            // Logits for the last position
            let logits = logits.squeeze(0).map_err(map_candle_err)?;
            let logits = logits
                .get(logits.dim(0).map_err(map_candle_err)? - 1)
                .map_err(map_candle_err)?;

            let logits = match params.repetition_penalty {
                Some(penalty) if penalty != 1.0 => {
                    let start = generated_tokens.len().saturating_sub(REPEAT_LAST_N);
                    apply_repeat_penalty(&logits, penalty, &generated_tokens[start..])
                        .map_err(map_candle_err)?
                }
                _ => logits,
            };

            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;

            if next_token == self.eos_token_id {
                break;
            }

            generated_tokens.push(next_token);

            input_ids = Tensor::new(&[next_token][..], &self.device)
                .map_err(map_candle_err)?
                .unsqueeze(0)
                .map_err(map_candle_err)?;
        }

        let output = self
            .tokenizer
            .decode(&generated_tokens, true)
            .map_err(|e| GenerateError::ApiError {
                status_code: 500,
                message: format!("Detokenization failed: {e}"),
            })?;

        debug!(
            completion_tokens = generated_tokens.len(),
            output_len = output.len(),
            "Generation complete"
        );

        Ok(output)
    }
}

/// Map Candle errors to GenerateError.
fn map_candle_err(e: candle_core::Error) -> GenerateError {
    GenerateError::ApiError {
        status_code: 500,
        message: format!("Candle inference error: {e}"),
    }
}

// ── TextGenerator implementation ───────────────────────────────────────

#[async_trait]
impl ojisan_core::TextGenerator for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResult, GenerateError> {
        // Init-once: load on the first request, reuse forever after
        {
            let state = self.inner.lock().await;
            if state.is_none() {
                drop(state);
                info!(model = %self.model_name, "Loading local model on first request...");
                let name = self.model_name.clone();
                let loaded = tokio::task::spawn_blocking(move || LocalModelState::load(&name))
                    .await
                    .map_err(|e| GenerateError::ApiError {
                        status_code: 500,
                        message: format!("Model loading task failed: {e}"),
                    })??;

                let mut state = self.inner.lock().await;
                *state = Some(loaded);
            }
        }

        // Run inference on a blocking thread (Candle is CPU-bound)
        let inner = self.inner.clone();
        let text = tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            let state = guard.as_mut().expect("model must be loaded");
            state.generate(&request)
        })
        .await
        .map_err(|e| GenerateError::ApiError {
            status_code: 500,
            message: format!("Inference task panicked: {e}"),
        })??;

        if text.trim().is_empty() {
            return Err(GenerateError::EmptyResponse);
        }

        Ok(GenerationResult { text })
    }

    async fn health_check(&self) -> std::result::Result<bool, GenerateError> {
        // Local backend needs no network once loaded
        Ok(true)
    }
}
