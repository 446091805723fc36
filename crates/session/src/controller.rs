//! The session controller — one conversation, one turn at a time.
//!
//! A two-state machine (Idle / Generating) drives the whole pipeline:
//! validate input → render prompt → invoke backend → extract utterance →
//! append both turns. The Generating state is the sole concurrency guard;
//! at most one transformation is in flight per session.
//!
//! Errors from the backend and the postprocessor stop here. They are
//! reported as an [`SubmitOutcome::Unanswered`] value, never raised — and
//! no failure path may leave the session in the Generating state.

use ojisan_core::error::{ExtractError, GenerateError};
use ojisan_core::{ChatTurn, Session, TextGenerator};
use ojisan_persona::PromptStrategy;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// The controller's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to accept a submission
    Idle,
    /// A transformation is in flight
    Generating,
}

/// Why a submitted turn went unanswered. Contained at the controller
/// boundary; the rendering collaborator decides how to display it.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// What a call to [`SessionController::submit`] did.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// User and persona turns were both appended.
    Answered,

    /// The input was blank; nothing happened.
    IgnoredBlank,

    /// A generation was already in flight; nothing happened.
    Busy,

    /// The user turn was appended but generation or extraction failed.
    /// The unanswered user turn stays visible by design.
    Unanswered(TurnError),
}

/// Orchestrates transformation turns against one [`Session`].
///
/// The session's history is mutated only here, and only by appending.
pub struct SessionController {
    session: Session,
    strategy: PromptStrategy,
    generator: Arc<dyn TextGenerator>,
    timeout: Option<Duration>,
    state: SessionState,
}

impl SessionController {
    /// Create a controller with an empty session.
    pub fn new(strategy: PromptStrategy, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            session: Session::new(),
            strategy,
            generator,
            timeout: None,
            state: SessionState::Idle,
        }
    }

    /// Bound each backend call; expiry behaves exactly like a backend error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read access to the session for rendering.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The conversation history, oldest first.
    pub fn history(&self) -> &[ChatTurn] {
        &self.session.turns
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stage raw keystroke text from the rendering collaborator.
    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.session.pending_input = text.into();
    }

    /// The staged-but-unsubmitted input line.
    pub fn pending_input(&self) -> &str {
        &self.session.pending_input
    }

    /// Run one full transformation turn.
    ///
    /// On success the history grows by exactly two turns (User then
    /// Persona); on failure by exactly one (the unanswered User turn);
    /// on blank input or while busy, by none.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        if self.state == SessionState::Generating {
            warn!("submit while a generation is in flight, ignoring");
            return SubmitOutcome::Busy;
        }

        let input = text.trim();
        if input.is_empty() {
            debug!("blank submission, no-op");
            return SubmitOutcome::IgnoredBlank;
        }

        self.state = SessionState::Generating;
        self.session.push(ChatTurn::user(input));
        // The user turn is durably appended; the staged input is spent.
        self.session.pending_input.clear();

        let outcome = self.run_turn(input).await;
        self.state = SessionState::Idle;

        match outcome {
            Ok(utterance) => {
                self.session.push(ChatTurn::persona(utterance));
                SubmitOutcome::Answered
            }
            Err(err) => {
                warn!(error = %err, "turn left unanswered");
                SubmitOutcome::Unanswered(err)
            }
        }
    }

    async fn run_turn(&self, input: &str) -> Result<String, TurnError> {
        let request = self.strategy.render(input);

        debug!(
            backend = self.generator.name(),
            prompt_chars = request.prompt.chars().count(),
            "Invoking backend"
        );

        let generation = self.generator.generate(request.clone());
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, generation)
                .await
                .map_err(|_| {
                    GenerateError::Timeout(format!("no response after {}s", limit.as_secs()))
                })??,
            None => generation.await?,
        };

        let utterance = self.strategy.extract(&result.text, &request)?;
        Ok(utterance)
    }
}
