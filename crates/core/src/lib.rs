//! # Ojisan Core
//!
//! Domain types, traits, and error definitions for the ojisan persona-chat
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The text-generation backend is defined as a trait here; implementations
//! live in `ojisan-backends`. This enables:
//! - Swapping backends via configuration (HTTP endpoint vs. local model)
//! - Easy testing with scripted mock generators
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod generator;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ExtractError, GenerateError, Result};
pub use generator::{GenerationRequest, GenerationResult, SamplingParams, TextGenerator};
pub use turn::{ChatTurn, Session, Speaker};
