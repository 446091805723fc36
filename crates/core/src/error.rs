//! Error types for the ojisan domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all ojisan operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),

    // --- Extraction errors ---
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by a [`TextGenerator`](crate::TextGenerator) backend.
///
/// A backend must never return a blank generation silently — malformed or
/// empty responses surface as one of these variants instead.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Generation timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned an empty generation")]
    EmptyResponse,
}

/// Failures raised while extracting a clean utterance from a raw generation.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Postprocessing produced an empty utterance")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_error_displays_correctly() {
        let err = Error::Generate(GenerateError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn timeout_error_displays_correctly() {
        let err = Error::Generate(GenerateError::Timeout("after 30s".into()));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("after 30s"));
    }

    #[test]
    fn extract_error_converts_to_top_level() {
        let err: Error = ExtractError::Empty.into();
        assert!(err.to_string().contains("empty utterance"));
    }
}
