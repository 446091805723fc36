//! ChatML template rendering.
//!
//! Linearizes role-tagged messages into the `<|im_start|>role ... <|im_end|>`
//! wire format used by the Qwen model family, appending the assistant
//! generation cue. With `suppress_reasoning` set, an empty think block is
//! rendered after the cue so the model emits no deliberation text ahead of
//! the final answer (the `enable_thinking = false` rendering of Qwen3).

/// Start-of-message marker.
pub const IM_START: &str = "<|im_start|>";

/// End-of-message marker. Also the stop sequence for chat generations.
pub const IM_END: &str = "<|im_end|>";

/// Render a system + user message pair into a single ChatML prompt string,
/// ending with the assistant generation cue.
pub fn render_chatml(system: &str, user: &str, suppress_reasoning: bool) -> String {
    let mut prompt = String::new();
    prompt.push_str(IM_START);
    prompt.push_str("system\n");
    prompt.push_str(system);
    prompt.push_str(IM_END);
    prompt.push('\n');
    prompt.push_str(IM_START);
    prompt.push_str("user\n");
    prompt.push_str(user);
    prompt.push_str(IM_END);
    prompt.push('\n');
    prompt.push_str(IM_START);
    prompt.push_str("assistant\n");
    if suppress_reasoning {
        prompt.push_str("<think>\n\n</think>\n\n");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chatml_shape() {
        let prompt = render_chatml("ルール", "おはよう", false);
        assert!(prompt.starts_with("<|im_start|>system\nルール<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>user\nおはよう<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn reasoning_suppression_appends_empty_think_block() {
        let prompt = render_chatml("ルール", "おはよう", true);
        assert!(prompt.ends_with("<|im_start|>assistant\n<think>\n\n</think>\n\n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render_chatml("s", "u", true);
        let b = render_chatml("s", "u", true);
        assert_eq!(a, b);
    }
}
