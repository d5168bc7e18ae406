//! Character-ratio token estimation.
//!
//! A fixed 4-characters-per-token ratio, not a true tokenizer. Accuracy is
//! intentionally approximate: the estimates only feed threshold comparisons
//! in the [`ContextManager`](super::ContextManager), where being off by a
//! few percent changes nothing. In exchange the functions are pure, fast,
//! and deterministic, so every pruning decision is reproducible in tests.

use crate::{ContentPart, Message};

/// Characters per token for estimation.
pub const CHARS_PER_TOKEN: u32 = 4;

/// Fixed structural overhead charged per message (role, framing).
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Estimate the token count of a piece of text: `ceil(len / 4)`.
pub fn estimate_text(text: &str) -> u32 {
    (text.len() as u32).div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the token count of a single content part.
///
/// Tool-call arguments are serialized to their canonical JSON string so the
/// estimate tracks what actually goes over the wire.
pub fn estimate_part(part: &ContentPart) -> u32 {
    match part {
        ContentPart::Text { text } => estimate_text(text),
        ContentPart::ToolCall {
            name, arguments, ..
        } => {
            let args = serde_json::to_string(arguments).unwrap_or_default();
            estimate_text(name) + estimate_text(&args)
        }
        ContentPart::ToolResult { output, .. } => estimate_text(output),
    }
}

/// Estimate the token count of a message: per-message overhead plus the sum
/// over all parts.
pub fn estimate_message(message: &Message) -> u32 {
    MESSAGE_OVERHEAD_TOKENS + message.parts.iter().map(estimate_part).sum::<u32>()
}

/// Estimate the total token count of a conversation.
pub fn estimate_conversation(messages: &[Message]) -> u32 {
    messages.iter().map(estimate_message).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_text(""), 0);
    }

    #[test]
    fn rounds_up_at_the_boundary() {
        assert_eq!(estimate_text("a"), 1);
        assert_eq!(estimate_text("abcd"), 1);
        assert_eq!(estimate_text("abcde"), 2);
        assert_eq!(estimate_text(&"x".repeat(400)), 100);
    }

    #[test]
    fn deterministic_across_calls() {
        let text = "fn main() { println!(\"hello\"); }";
        assert_eq!(estimate_text(text), estimate_text(text));
    }

    #[test]
    fn concatenation_never_decreases() {
        let samples = ["", "a", "abc", "hello world", "x"];
        for t1 in samples {
            for t2 in samples {
                let joined = format!("{t1}{t2}");
                assert!(estimate_text(&joined) >= estimate_text(t1));
                assert!(estimate_text(&joined) >= estimate_text(t2));
            }
        }
    }

    #[test]
    fn message_adds_fixed_overhead() {
        let msg = Message::user("abcd");
        assert_eq!(estimate_message(&msg), MESSAGE_OVERHEAD_TOKENS + 1);

        let empty = Message::assistant(vec![]);
        assert_eq!(estimate_message(&empty), MESSAGE_OVERHEAD_TOKENS);
    }

    #[test]
    fn tool_call_counts_name_and_arguments() {
        let part = ContentPart::tool_call("c1", "grep", serde_json::json!({"pattern": "TODO"}));
        let args_len = serde_json::json!({"pattern": "TODO"}).to_string().len() as u32;
        assert_eq!(
            estimate_part(&part),
            estimate_text("grep") + args_len.div_ceil(CHARS_PER_TOKEN)
        );
    }

    #[test]
    fn tool_result_counts_output() {
        let part = ContentPart::tool_result("c1", "x".repeat(4000), false);
        assert_eq!(estimate_part(&part), 1000);
    }

    #[test]
    fn conversation_sums_messages() {
        let messages = vec![Message::user("abcd"), Message::assistant_text("efghijkl")];
        assert_eq!(
            estimate_conversation(&messages),
            estimate_message(&messages[0]) + estimate_message(&messages[1])
        );
    }
}
