//! Prompt strategies — rendering a request and extracting the utterance.
//!
//! The two prompt formats are incompatible on the wire but expose the same
//! two operations, so they live behind one tagged variant selected once at
//! configuration time. `render` is deterministic; `extract` is the
//! postprocessor that turns a possibly noisy raw generation into a single
//! clean line, tolerating format deviations instead of failing on them.

use crate::ruleset::{COMPLETION_DELIMITER, PersonaRuleset};
use crate::template::{IM_END, render_chatml};
use ojisan_core::{ExtractError, GenerationRequest};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which prompt format a session uses. Configuration-addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Instruction + labeled delimiter the model continues after
    Completion,
    /// Role-tagged system/user messages rendered through ChatML
    Chat,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completion" => Ok(Self::Completion),
            "chat" => Ok(Self::Chat),
            other => Err(format!(
                "unknown strategy '{other}' (expected 'completion' or 'chat')"
            )),
        }
    }
}

/// A prompt strategy bound to its ruleset.
///
/// Exactly one render operation and one extract operation per variant —
/// the pipeline never branches on the format anywhere else.
#[derive(Debug, Clone)]
pub enum PromptStrategy {
    Completion { ruleset: PersonaRuleset },
    Chat { ruleset: PersonaRuleset },
}

impl PromptStrategy {
    /// The completion strategy with its preset ruleset.
    pub fn completion() -> Self {
        Self::Completion {
            ruleset: PersonaRuleset::completion(),
        }
    }

    /// The chat strategy with its preset ruleset.
    pub fn chat() -> Self {
        Self::Chat {
            ruleset: PersonaRuleset::chat(),
        }
    }

    /// Construct the preset strategy for a configured kind.
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Completion => Self::completion(),
            StrategyKind::Chat => Self::chat(),
        }
    }

    /// The ruleset this strategy renders under.
    pub fn ruleset(&self) -> &PersonaRuleset {
        match self {
            Self::Completion { ruleset } | Self::Chat { ruleset } => ruleset,
        }
    }

    /// Render an input sentence into a generation request.
    ///
    /// Deterministic for identical `(ruleset, input)`. The input is assumed
    /// non-blank — blank submissions are rejected upstream by the session
    /// controller, never here.
    pub fn render(&self, input: &str) -> GenerationRequest {
        match self {
            Self::Completion { ruleset } => GenerationRequest {
                prompt: format!(
                    "{}\n\n文：{}\n\n{}",
                    ruleset.instruction, input, COMPLETION_DELIMITER
                ),
                params: ruleset.params.clone(),
                stop: vec![],
            },
            Self::Chat { ruleset } => GenerationRequest {
                prompt: render_chatml(&ruleset.instruction, input, true),
                params: ruleset.params.clone(),
                stop: vec![IM_END.to_string()],
            },
        }
    }

    /// Extract a single clean utterance from a raw generation.
    ///
    /// Steps: prompt-prefix removal, stop-sequence cutoff, single-line
    /// truncation, trim, and (chat only) punctuation normalization. A raw
    /// text that matches neither prefix nor delimiter passes through whole;
    /// only an ultimately empty result is an error.
    pub fn extract(
        &self,
        raw: &str,
        request: &GenerationRequest,
    ) -> Result<String, ExtractError> {
        let continuation = match self {
            // Everything after the LAST delimiter occurrence. The model
            // sometimes restates the instruction, echoing the delimiter
            // early; the last occurrence is the one it continued after.
            Self::Completion { .. } => match raw.rfind(COMPLETION_DELIMITER) {
                Some(idx) => &raw[idx + COMPLETION_DELIMITER.len()..],
                None => {
                    debug!("raw generation carries no delimiter, passing through");
                    raw
                }
            },
            // The backend may echo the rendered prompt verbatim; slice it
            // off by known length.
            Self::Chat { .. } => raw.strip_prefix(request.prompt.as_str()).unwrap_or(raw),
        };

        let continuation = cut_at_stop(continuation, &request.stop);

        let line = first_nonblank_line(continuation).trim();

        let utterance = match self {
            Self::Completion { .. } => line.to_string(),
            Self::Chat { .. } => normalize_punctuation(line),
        };

        if utterance.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(utterance)
    }
}

/// Truncate at the first occurrence of any stop sequence.
fn cut_at_stop<'a>(text: &'a str, stop: &[String]) -> &'a str {
    let mut end = text.len();
    for s in stop {
        if let Some(idx) = text.find(s.as_str()) {
            end = end.min(idx);
        }
    }
    &text[..end]
}

/// The first line with non-whitespace content, or "" if there is none.
///
/// Guards against the model appending explanatory commentary after the
/// transformed sentence.
fn first_nonblank_line(text: &str) -> &str {
    text.lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

/// Normalize separators to the full-width glyphs the persona writes with:
/// `、` and `,` become `，`, `。` becomes `．`. Idempotent — the image of
/// the map is fixed under the map.
pub fn normalize_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '、' | ',' => '，',
            '。' => '．',
            other => other,
        })
        .collect()
}
