//! The persona ruleset — immutable, process-wide configuration.
//!
//! A ruleset bundles the instruction text expressing the style constraints
//! (no translation, no explanation, no added content, meaning preserved,
//! informal affectionate tone, heavy emoji, exaggerated sentence-final
//! particles, exactly one output line) with the sampling hyperparameters
//! used when generating under it. It has no behavior of its own; the
//! prompt strategies consume it as a value.

use ojisan_core::SamplingParams;
use serde::{Deserialize, Serialize};

/// Instruction text for the completion-style prompt. The trailing label in
/// [`COMPLETION_DELIMITER`] is appended by the strategy, not included here.
pub const COMPLETION_INSTRUCTION: &str = "次の文を、絵文字や語尾を多めに使った“おじさん構文”にしてください。\
出力するのは入力文をおじさん構文に変換したものだけで，それ以外の説明などは含めないこと．";

/// The labeled marker the completion-style model continues after.
///
/// Chosen so it is unlikely to occur verbatim inside legitimate output
/// ahead of the desired continuation. Used for both rendering and
/// extraction — the two must never diverge.
pub const COMPLETION_DELIMITER: &str = "おじさん構文：";

/// System instruction for the chat-style prompt.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "あなたは文章を“おじさん構文”に書き換えるアシスタントです。\
翻訳はしない。説明や前置きは書かない。元の文にない内容を足さない。意味は必ず保つ。\
口調はくだけて馴れ馴れしく、絵文字をたっぷり使い、語尾は大げさに伸ばすこと。\
出力は変換後の一文だけにすること。";

/// The fixed stylistic constraints plus sampling hyperparameters.
///
/// Immutable once constructed; shared read-only across all turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaRuleset {
    /// The constraint text fed to the model (completion instruction or
    /// chat system message, depending on the strategy)
    pub instruction: String,

    /// Sampling hyperparameters passed through to the backend unchanged
    pub params: SamplingParams,
}

impl PersonaRuleset {
    /// The completion-style preset: single combined instruction, plain
    /// do-sample temperature, no nucleus/repetition tuning.
    ///
    /// The token budget is a new-tokens budget of 96 — a deliberate
    /// replacement for the total-sequence cap the completion format
    /// historically used, so both presets share one budgeting semantics.
    pub fn completion() -> Self {
        Self {
            instruction: COMPLETION_INSTRUCTION.to_string(),
            params: SamplingParams {
                temperature: 0.8,
                top_p: None,
                repetition_penalty: None,
                max_new_tokens: 96,
            },
        }
    }

    /// The chat-style preset: structured system instruction with the full
    /// sampling tuple (temperature 0.8, top_p 0.92, repetition penalty
    /// 1.25, 64 new tokens).
    pub fn chat() -> Self {
        Self {
            instruction: CHAT_SYSTEM_INSTRUCTION.to_string(),
            params: SamplingParams {
                temperature: 0.8,
                top_p: Some(0.92),
                repetition_penalty: Some(1.25),
                max_new_tokens: 64,
            },
        }
    }

    /// Replace the sampling parameters (configuration override hook).
    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_preset_sampling() {
        let ruleset = PersonaRuleset::completion();
        assert!((ruleset.params.temperature - 0.8).abs() < f32::EPSILON);
        assert!(ruleset.params.top_p.is_none());
        assert!(ruleset.params.repetition_penalty.is_none());
        assert_eq!(ruleset.params.max_new_tokens, 96);
    }

    #[test]
    fn chat_preset_sampling() {
        let ruleset = PersonaRuleset::chat();
        assert_eq!(ruleset.params.top_p, Some(0.92));
        assert_eq!(ruleset.params.repetition_penalty, Some(1.25));
        assert_eq!(ruleset.params.max_new_tokens, 64);
    }

    #[test]
    fn presets_carry_constraint_text() {
        assert!(PersonaRuleset::completion().instruction.contains("おじさん構文"));
        let chat = PersonaRuleset::chat();
        assert!(chat.instruction.contains("翻訳はしない"));
        assert!(chat.instruction.contains("一文だけ"));
    }

    #[test]
    fn params_override() {
        let ruleset = PersonaRuleset::chat().with_params(SamplingParams {
            temperature: 0.2,
            ..SamplingParams::default()
        });
        assert!((ruleset.params.temperature - 0.2).abs() < f32::EPSILON);
    }
}
