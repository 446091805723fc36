//! # Ojisan Backends
//!
//! [`TextGenerator`](ojisan_core::TextGenerator) implementations:
//!
//! - [`OpenAiCompatBackend`] — any OpenAI-compatible `/v1/completions`
//!   endpoint (vLLM, Ollama, TGI with the shim, llama.cpp server)
//! - [`LocalBackend`] — in-process GGUF inference via Candle, behind the
//!   `local` feature; the model is loaded once and reused read-only

pub mod openai_compat;

#[cfg(feature = "local")]
pub mod local;

pub use openai_compat::OpenAiCompatBackend;

#[cfg(feature = "local")]
pub use local::LocalBackend;
