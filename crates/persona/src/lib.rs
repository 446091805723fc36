//! # Ojisan Persona
//!
//! Everything that turns a plain sentence into a generation request and a
//! raw generation back into a clean persona utterance:
//!
//! - [`PersonaRuleset`] — the fixed stylistic constraints and sampling
//!   hyperparameters, as immutable configuration values
//! - [`PromptStrategy`] — the two interchangeable prompt formats
//!   (completion-with-delimiter vs. role-tagged chat), each pairing one
//!   render operation with one extract operation
//! - the ChatML template renderer with reasoning-trace suppression
//!
//! Rendering is deterministic; all randomness belongs to backend sampling.

pub mod ruleset;
pub mod strategy;
pub mod template;

pub use ruleset::PersonaRuleset;
pub use strategy::{PromptStrategy, StrategyKind};
pub use template::render_chatml;
