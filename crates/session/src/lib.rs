//! # Ojisan Session
//!
//! The session controller — the orchestrator that runs one full
//! transformation turn (validate → render → generate → extract → append)
//! and owns the append-only conversation history.

pub mod controller;

pub use controller::{SessionController, SessionState, SubmitOutcome, TurnError};
