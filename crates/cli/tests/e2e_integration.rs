//! End-to-end integration tests for the ojisan conversation pipeline.
//!
//! These exercise the full turn flow from submitted sentence to rendered
//! history — strategy rendering, backend invocation, postprocessing, and
//! the session state machine — against scripted backends.

use async_trait::async_trait;
use ojisan_core::error::GenerateError;
use ojisan_core::{GenerationRequest, GenerationResult, Speaker, TextGenerator};
use ojisan_persona::PromptStrategy;
use ojisan_session::{SessionController, SessionState, SubmitOutcome};
use std::sync::{Arc, Mutex};

// ── Mock backend ─────────────────────────────────────────────────────────

/// A scripted backend that returns canned generations in sequence.
struct ScriptedBackend {
    responses: Mutex<Vec<Result<String, GenerateError>>>,
    /// Echo the rendered prompt ahead of the canned text, the way
    /// in-process pipelines return prompt + continuation.
    echo_prompt: bool,
    calls: Mutex<usize>,
}

impl ScriptedBackend {
    fn new(echo_prompt: bool, responses: Vec<Result<String, GenerateError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            echo_prompt,
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerateError> {
        let mut calls = self.calls.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "ScriptedBackend exhausted");
        *calls += 1;
        let text = responses.remove(0)?;
        let text = if self.echo_prompt {
            format!("{}{}", request.prompt, text)
        } else {
            text
        };
        Ok(GenerationResult { text })
    }
}

// ── E2E: chat strategy ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_chat_prompt_echo_and_normalization() {
    // Scenario: the backend echoes the full rendered prompt, then the
    // utterance. Prefix stripping and punctuation normalization leave
    // exactly the utterance; already-full-width glyphs pass through.
    let backend = Arc::new(ScriptedBackend::new(
        true,
        vec![Ok("ヤッホー，おはよう♪今日もファイトだヨ〜💕".into())],
    ));
    let mut controller = SessionController::new(PromptStrategy::chat(), backend.clone());

    let outcome = controller.submit("おはよう！今日も頑張ろうね！").await;

    assert!(matches!(outcome, SubmitOutcome::Answered));
    assert_eq!(backend.calls(), 1);

    let history = controller.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].speaker, Speaker::User);
    assert_eq!(history[0].text, "おはよう！今日も頑張ろうね！");
    assert_eq!(history[1].speaker, Speaker::Persona);
    assert_eq!(history[1].text, "ヤッホー，おはよう♪今日もファイトだヨ〜💕");
}

#[tokio::test]
async fn e2e_chat_normalizes_source_punctuation() {
    let backend = Arc::new(ScriptedBackend::new(
        true,
        vec![Ok("おっはよ〜、今日も元気だね。".into())],
    ));
    let mut controller = SessionController::new(PromptStrategy::chat(), backend);

    controller.submit("おはよう").await;

    assert_eq!(controller.history()[1].text, "おっはよ〜，今日も元気だね．");
}

// ── E2E: completion strategy ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_completion_delimiter_extraction_with_commentary() {
    // The model restates the instruction (echoing the delimiter early),
    // answers after a second delimiter, then appends commentary on a new
    // line. Last-occurrence extraction + single-line truncation recover
    // just the utterance.
    let raw = "おじさん構文：に変換します。\nおじさん構文：オッハー☀️今日もがんばっちゃうゾ〜💪\n（以上が変換結果です）";
    let backend = Arc::new(ScriptedBackend::new(false, vec![Ok(raw.into())]));
    let mut controller = SessionController::new(PromptStrategy::completion(), backend);

    let outcome = controller.submit("おはよう！").await;

    assert!(matches!(outcome, SubmitOutcome::Answered));
    assert_eq!(
        controller.history()[1].text,
        "オッハー☀️今日もがんばっちゃうゾ〜💪"
    );
}

// ── E2E: multi-turn conversation ─────────────────────────────────────────

#[tokio::test]
async fn e2e_history_accumulates_in_order() {
    let backend = Arc::new(ScriptedBackend::new(
        false,
        vec![
            Ok("ヤッホー😘".into()),
            Err(GenerateError::Network("connection reset".into())),
            Ok("おやすみだヨ🌙".into()),
        ],
    ));
    let mut controller = SessionController::new(PromptStrategy::completion(), backend);

    assert!(matches!(
        controller.submit("おはよう").await,
        SubmitOutcome::Answered
    ));
    assert!(matches!(
        controller.submit("元気？").await,
        SubmitOutcome::Unanswered(_)
    ));
    assert!(matches!(
        controller.submit("おやすみ").await,
        SubmitOutcome::Answered
    ));

    // 2 + 1 + 2 turns, in submission order, the failed turn unanswered
    let texts: Vec<(&Speaker, &str)> = controller
        .history()
        .iter()
        .map(|t| (&t.speaker, t.text.as_str()))
        .collect();
    assert_eq!(
        texts,
        vec![
            (&Speaker::User, "おはよう"),
            (&Speaker::Persona, "ヤッホー😘"),
            (&Speaker::User, "元気？"),
            (&Speaker::User, "おやすみ"),
            (&Speaker::Persona, "おやすみだヨ🌙"),
        ]
    );
    assert_eq!(controller.state(), SessionState::Idle);
}

// ── E2E: failure scenario ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_backend_failure_leaves_question_visible() {
    let backend = Arc::new(ScriptedBackend::new(
        false,
        vec![Err(GenerateError::ApiError {
            status_code: 503,
            message: "model is loading".into(),
        })],
    ));
    let mut controller = SessionController::new(PromptStrategy::chat(), backend);

    let outcome = controller.submit("おはよう！").await;

    assert!(matches!(outcome, SubmitOutcome::Unanswered(_)));
    let history = controller.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].speaker, Speaker::User);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn e2e_blank_input_never_reaches_the_backend() {
    let backend = Arc::new(ScriptedBackend::new(false, vec![]));
    let mut controller = SessionController::new(PromptStrategy::chat(), backend.clone());

    let outcome = controller.submit("   \n ").await;

    assert!(matches!(outcome, SubmitOutcome::IgnoredBlank));
    assert_eq!(backend.calls(), 0);
    assert!(controller.history().is_empty());
}
