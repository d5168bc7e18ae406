//! The pruning/compaction policy that keeps a conversation inside its
//! model's context budget.
//!
//! Two mechanisms, applied in order of increasing destructiveness:
//!
//! 1. **Pruning** replaces old tool-result content with a one-line
//!    placeholder. No model call, structure preserved, the full output
//!    still exists in the environment. This is the preferred mechanism.
//! 2. **Compaction** replaces the entire history with a model-generated
//!    summary. One model call, all prior detail irrecoverably lost except
//!    what the summary captured. Last resort.
//!
//! [`ContextManager::process_messages`] combines both into the ordered
//! decision procedure the session runs once per user turn.

use crate::Message;
use crate::context::estimator::{estimate_conversation, estimate_text};
use crate::context::limits::{ContextLimits, limits_for_model};
use crate::ContentPart;
use crate::provider::LanguageModel;
use tracing::{debug, info, warn};

/// Placeholder written in place of pruned tool-result content.
///
/// Both the pruning writer and the "already pruned?" check reference this
/// constant so they can't drift out of sync.
pub const PRUNED_PLACEHOLDER: &str = "[Tool output cleared - context management]";

/// Prune once estimated tokens exceed this fraction of usable context.
pub const PRUNE_THRESHOLD: f64 = 0.70;

/// Compact once estimated tokens exceed this fraction of usable context.
pub const COMPACT_THRESHOLD: f64 = 0.85;

/// The most recent 40k tokens of eligible tool-result content are protected
/// from pruning; only parts past this accumulation become candidates.
pub const PRUNE_PROTECT_TOKENS: u32 = 40_000;

/// Pruning aborts unless it can free at least this many tokens.
pub const PRUNE_MIN_SAVINGS_TOKENS: u32 = 20_000;

/// Output cap for the summarization call.
const SUMMARY_MAX_TOKENS: u32 = 2_000;

/// Fixed system instruction for the compaction summary.
const SUMMARY_SYSTEM_PROMPT: &str = "\
Summarize this coding session conversation in 1000 words or less. Cover:
- Tasks that were accomplished
- Files that were read, created, or modified
- The current state of the work
- Any pending work or next steps

Be factual and concise. Preserve file paths, function names, and error \
messages verbatim.";

/// User prompt opening the post-compaction skeleton.
const SUMMARY_REQUEST_TEXT: &str = "What have we accomplished so far in this session?";

/// User acknowledgment closing the post-compaction skeleton.
const SUMMARY_ACK_TEXT: &str = "Thanks for the summary. Let's continue.";

/// What `process_messages` did to the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextAction {
    None,
    Pruned,
    Compacted,
}

/// Point-in-time context statistics for a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextStats {
    pub message_count: usize,
    pub estimated_tokens: u32,
    pub context_window: u32,
    pub output_reserve: u32,
    pub usable_context: u32,
    /// `round(estimated / usable * 100)`.
    pub usage_pct: u32,
    /// Total tool-result parts in the conversation.
    pub tool_result_parts: usize,
    /// Tool-result parts already bearing the pruned placeholder.
    pub pruned_outputs: usize,
}

/// Owns the pruning/compaction policy for one model's context budget.
///
/// Bound to a single model id at construction; the resolved
/// [`ContextLimits`] never change for the manager's lifetime.
pub struct ContextManager {
    model: String,
    limits: ContextLimits,
}

impl ContextManager {
    /// Create a manager for a model id, resolving its limits from the
    /// static table (with provider fallback).
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let limits = limits_for_model(&model);
        debug!(
            "Context manager for {}: window={}, reserve={}",
            model, limits.context_window, limits.output_reserve
        );
        Self { model, limits }
    }

    /// Create a manager with explicit limits, bypassing the lookup table.
    pub fn with_limits(model: impl Into<String>, limits: ContextLimits) -> Self {
        Self {
            model: model.into(),
            limits,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Usable context: total window minus the output reserve.
    pub fn usable_context(&self) -> u32 {
        self.limits.usable()
    }

    /// True when estimated tokens exceed 70% of usable context.
    pub fn should_prune(&self, messages: &[Message]) -> bool {
        f64::from(estimate_conversation(messages))
            > f64::from(self.usable_context()) * PRUNE_THRESHOLD
    }

    /// True when estimated tokens exceed 85% of usable context.
    pub fn should_compact(&self, messages: &[Message]) -> bool {
        f64::from(estimate_conversation(messages))
            > f64::from(self.usable_context()) * COMPACT_THRESHOLD
    }

    /// Replace old tool-result content with [`PRUNED_PLACEHOLDER`].
    ///
    /// Walks the conversation from the most recent message backward. The two
    /// most recent user turns are exempt (a turn starts at a real user
    /// prompt, not at a synthesized tool-result carrier). For older
    /// messages, tool-result parts are charged against a running
    /// accumulator; the most recent [`PRUNE_PROTECT_TOKENS`] of eligible
    /// content stays protected and everything past it becomes a candidate,
    /// biasing pruning toward the oldest outputs. If the candidates sum to
    /// fewer than [`PRUNE_MIN_SAVINGS_TOKENS`], nothing is pruned.
    ///
    /// Returns the new conversation, the number of parts pruned, and the
    /// tokens nominally saved. The input is never mutated.
    pub fn prune_tool_outputs(&self, messages: &[Message]) -> (Vec<Message>, usize, u32) {
        // (message index, part index, pre-prune token estimate)
        let mut candidates: Vec<(usize, usize, u32)> = Vec::new();
        let mut user_turns_seen = 0usize;
        let mut accumulated: u32 = 0;

        for (msg_idx, msg) in messages.iter().enumerate().rev() {
            // Turn exemption takes precedence over the token accumulator:
            // parts inside the two most recent user turns are never charged
            // against it, no matter their size.
            if user_turns_seen >= 2 {
                for (part_idx, part) in msg.parts.iter().enumerate().rev() {
                    if let ContentPart::ToolResult { output, .. } = part {
                        if output == PRUNED_PLACEHOLDER {
                            continue;
                        }
                        let tokens = estimate_text(output);
                        accumulated += tokens;
                        if accumulated > PRUNE_PROTECT_TOKENS {
                            candidates.push((msg_idx, part_idx, tokens));
                        }
                    }
                }
            }
            if msg.is_user_prompt() {
                user_turns_seen += 1;
            }
        }

        let total_savings: u32 = candidates.iter().map(|(_, _, t)| t).sum();
        if total_savings < PRUNE_MIN_SAVINGS_TOKENS {
            debug!(
                "Prune skipped: {total_savings} candidate tokens below the \
                 {PRUNE_MIN_SAVINGS_TOKENS} minimum"
            );
            return (messages.to_vec(), 0, 0);
        }

        let mut pruned = messages.to_vec();
        for &(msg_idx, part_idx, _) in &candidates {
            if let ContentPart::ToolResult {
                output, ..
            } = &mut pruned[msg_idx].parts[part_idx]
            {
                *output = PRUNED_PLACEHOLDER.to_string();
            }
        }

        info!(
            "Pruned {} tool result(s), ~{} tokens freed",
            candidates.len(),
            total_savings
        );
        (pruned, candidates.len(), total_savings)
    }

    /// Compact the conversation into a 3-message summary skeleton.
    ///
    /// Issues one non-streaming model call. On success the entire history is
    /// replaced by: a user prompt asking what has been accomplished, an
    /// assistant message with the summary, and a user acknowledgment. On
    /// model failure the input is returned unchanged; the failure is logged,
    /// never raised.
    pub async fn summarize(
        &self,
        messages: &[Message],
        model: &dyn LanguageModel,
    ) -> Vec<Message> {
        let transcript = render_transcript(messages);
        match model
            .generate_text(SUMMARY_SYSTEM_PROMPT, &transcript, SUMMARY_MAX_TOKENS)
            .await
        {
            Ok(summary) => {
                info!(
                    "Compacted {} messages into a {}-char summary",
                    messages.len(),
                    summary.len()
                );
                vec![
                    Message::user(SUMMARY_REQUEST_TEXT),
                    Message::assistant_text(summary),
                    Message::user(SUMMARY_ACK_TEXT),
                ]
            }
            Err(e) => {
                warn!("Summarization failed: {e}. Continuing without compaction.");
                messages.to_vec()
            }
        }
    }

    /// The combined policy, evaluated once per user turn before the model
    /// is invoked.
    ///
    /// Pruning is preferred: it is cheap and retains structure. Compaction
    /// runs only when pruning did not happen or did not free enough.
    pub async fn process_messages(
        &self,
        messages: Vec<Message>,
        model: &dyn LanguageModel,
    ) -> (Vec<Message>, ContextAction) {
        if self.should_prune(&messages) {
            let (pruned, count, _saved) = self.prune_tool_outputs(&messages);
            if count > 0 {
                if self.should_compact(&pruned) {
                    let compacted = self.summarize(&pruned, model).await;
                    // Summarize returns its input unchanged on model failure.
                    if compacted != pruned {
                        return (compacted, ContextAction::Compacted);
                    }
                }
                return (pruned, ContextAction::Pruned);
            }
        }

        if self.should_compact(&messages) {
            let compacted = self.summarize(&messages, model).await;
            if compacted != messages {
                return (compacted, ContextAction::Compacted);
            }
        }

        (messages, ContextAction::None)
    }

    /// Point-in-time statistics for a conversation.
    pub fn stats(&self, messages: &[Message]) -> ContextStats {
        let estimated_tokens = estimate_conversation(messages);
        let usable = self.usable_context();
        let usage_pct = if usable == 0 {
            0
        } else {
            (f64::from(estimated_tokens) / f64::from(usable) * 100.0).round() as u32
        };

        let mut tool_result_parts = 0usize;
        let mut pruned_outputs = 0usize;
        for msg in messages {
            for part in &msg.parts {
                if let ContentPart::ToolResult { output, .. } = part {
                    tool_result_parts += 1;
                    if output == PRUNED_PLACEHOLDER {
                        pruned_outputs += 1;
                    }
                }
            }
        }

        ContextStats {
            message_count: messages.len(),
            estimated_tokens,
            context_window: self.limits.context_window,
            output_reserve: self.limits.output_reserve,
            usable_context: usable,
            usage_pct,
            tool_result_parts,
            pruned_outputs,
        }
    }
}

/// Render a conversation as a plain-text transcript for the summarizer.
fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        for part in &msg.parts {
            match part {
                ContentPart::Text { text } => {
                    out.push_str(&format!("[{}]: {text}\n\n", msg.role));
                }
                ContentPart::ToolCall {
                    name, arguments, ..
                } => {
                    let args = serde_json::to_string(arguments).unwrap_or_default();
                    out.push_str(&format!("[{} tool call]: {name}({args})\n\n", msg.role));
                }
                ContentPart::ToolResult {
                    output, is_error, ..
                } => {
                    let tag = if *is_error { "tool error" } else { "tool result" };
                    out.push_str(&format!("[{tag}]: {output}\n\n"));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use crate::provider::{GenerateRequest, ModelFuture};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    /// Scripted model for summarization tests.
    struct FakeModel {
        reply: Result<String, String>,
        calls: Mutex<u32>,
    }

    impl FakeModel {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(0),
            }
        }

        fn failing(error: &str) -> Self {
            Self {
                reply: Err(error.to_string()),
                calls: Mutex::new(0),
            }
        }
    }

    impl LanguageModel for FakeModel {
        fn generate<'a>(
            &'a self,
            _request: GenerateRequest<'a>,
            _on_text: &'a (dyn Fn(&str) + Send + Sync),
        ) -> ModelFuture<'a> {
            Box::pin(async { Err("not used".to_string()) })
        }

        fn generate_text<'a>(
            &'a self,
            _system: &'a str,
            _user: &'a str,
            _max_tokens: u32,
        ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
            Box::pin(async {
                *self.calls.lock().unwrap() += 1;
                self.reply.clone()
            })
        }
    }

    fn manager_200k() -> ContextManager {
        // 200,000 usable tokens.
        ContextManager::with_limits("test/model", ContextLimits::new(208_192, 8_192))
    }

    /// One full turn: a user prompt, an assistant tool call, and a
    /// tool-result carrier with `result_chars` characters of output.
    fn turn(n: usize, result_chars: usize) -> Vec<Message> {
        vec![
            Message::user(format!("request {n}")),
            Message::assistant(vec![
                ContentPart::text("Working on it."),
                ContentPart::tool_call(
                    format!("call-{n}"),
                    "read_file",
                    serde_json::json!({"path": format!("file{n}.rs")}),
                ),
            ]),
            Message::tool_results(vec![ContentPart::tool_result(
                format!("call-{n}"),
                "x".repeat(result_chars),
                false,
            )]),
        ]
    }

    fn find_result_output(messages: &[Message], call_id: &str) -> String {
        for msg in messages {
            for part in &msg.parts {
                if let ContentPart::ToolResult { id, output, .. } = part
                    && id == call_id
                {
                    return output.clone();
                }
            }
        }
        panic!("no tool result for {call_id}");
    }

    #[test]
    fn usable_context_is_constant() {
        let mgr = manager_200k();
        assert_eq!(mgr.usable_context(), 200_000);
    }

    #[test]
    fn thresholds_trigger_at_the_right_points() {
        let mgr = ContextManager::with_limits("m", ContextLimits::new(1_100, 100));
        // usable = 1000; 70% = 700; 85% = 850.
        let small = vec![Message::user("x".repeat(400))]; // ~104 tokens
        assert!(!mgr.should_prune(&small));
        assert!(!mgr.should_compact(&small));

        let medium = vec![Message::user("x".repeat(3_000))]; // ~754 tokens
        assert!(mgr.should_prune(&medium));
        assert!(!mgr.should_compact(&medium));

        let large = vec![Message::user("x".repeat(3_500))]; // ~879 tokens
        assert!(mgr.should_prune(&large));
        assert!(mgr.should_compact(&large));
    }

    #[test]
    fn prune_noop_below_minimum_savings() {
        let mgr = manager_200k();
        // Three turns of tiny results: nothing worth pruning.
        let mut messages = Vec::new();
        for n in 0..3 {
            messages.extend(turn(n, 1_000));
        }
        let (out, count, saved) = mgr.prune_tool_outputs(&messages);
        assert_eq!(count, 0);
        assert_eq!(saved, 0);
        assert_eq!(out, messages);
    }

    #[test]
    fn prune_protects_two_most_recent_turns() {
        let mgr = manager_200k();
        // Four turns, each with a 200k-char (50k-token) result. Turns 3 and 4
        // are exempt; turn 2's result fills the 40k protection window and
        // spills past it, turn 1 is fully past it.
        let mut messages = Vec::new();
        for n in 1..=4 {
            messages.extend(turn(n, 200_000));
        }
        let (out, count, saved) = mgr.prune_tool_outputs(&messages);
        assert_eq!(count, 2);
        assert_eq!(saved, 100_000);
        assert_eq!(find_result_output(&out, "call-1"), PRUNED_PLACEHOLDER);
        assert_eq!(find_result_output(&out, "call-2"), PRUNED_PLACEHOLDER);
        assert_eq!(find_result_output(&out, "call-3").len(), 200_000);
        assert_eq!(find_result_output(&out, "call-4").len(), 200_000);
        // Original untouched.
        assert_eq!(find_result_output(&messages, "call-1").len(), 200_000);
    }

    #[test]
    fn prune_accumulator_spares_protected_window() {
        let mgr = manager_200k();
        // Five turns with 60k-char (15k-token) results. Turns 4-5 exempt.
        // Backward accumulation over turns 3, 2, 1: 15k, 30k, 45k. Only
        // turn 1 crosses the 40k protection line, and 15k < 20k minimum,
        // so nothing is pruned.
        let mut messages = Vec::new();
        for n in 1..=5 {
            messages.extend(turn(n, 60_000));
        }
        let (out, count, _) = mgr.prune_tool_outputs(&messages);
        assert_eq!(count, 0);
        assert_eq!(out, messages);
    }

    #[test]
    fn prune_is_idempotent() {
        let mgr = manager_200k();
        let mut messages = Vec::new();
        for n in 1..=4 {
            messages.extend(turn(n, 200_000));
        }
        let (once, count1, _) = mgr.prune_tool_outputs(&messages);
        assert!(count1 > 0);
        let (twice, count2, saved2) = mgr.prune_tool_outputs(&once);
        assert_eq!(count2, 0);
        assert_eq!(saved2, 0);
        assert_eq!(twice, once);
    }

    #[tokio::test]
    async fn summarize_collapses_to_three_messages() {
        let mgr = manager_200k();
        let mut messages = Vec::new();
        for n in 1..=3 {
            messages.extend(turn(n, 5_000));
        }
        let model = FakeModel::ok("We read three files and fixed the parser.");
        let out = mgr.summarize(&messages, &model).await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, Role::User);
        assert_eq!(out[0].text(), SUMMARY_REQUEST_TEXT);
        assert_eq!(out[1].role, Role::Assistant);
        assert!(out[1].text().contains("fixed the parser"));
        assert_eq!(out[2].role, Role::User);
        assert_eq!(out[2].text(), SUMMARY_ACK_TEXT);
    }

    #[tokio::test]
    async fn summarize_failure_returns_input_unchanged() {
        let mgr = manager_200k();
        let mut messages = Vec::new();
        for n in 1..=2 {
            messages.extend(turn(n, 5_000));
        }
        let model = FakeModel::failing("HTTP 500");
        let out = mgr.summarize(&messages, &model).await;
        assert_eq!(out, messages);
    }

    #[tokio::test]
    async fn process_messages_none_under_threshold() {
        let mgr = manager_200k();
        let messages = turn(1, 1_000);
        let model = FakeModel::ok("unused");
        let (out, action) = mgr.process_messages(messages.clone(), &model).await;
        assert_eq!(action, ContextAction::None);
        assert_eq!(out, messages);
        assert_eq!(*model.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn process_messages_prefers_pruning() {
        let mgr = manager_200k();
        // Four 50k-token results = ~200k tokens, over 70% but pruning two of
        // them drops usage below 85%, so no compaction.
        let mut messages = Vec::new();
        for n in 1..=4 {
            messages.extend(turn(n, 200_000));
        }
        let model = FakeModel::ok("unused");
        let (out, action) = mgr.process_messages(messages, &model).await;
        assert_eq!(action, ContextAction::Pruned);
        assert_eq!(find_result_output(&out, "call-1"), PRUNED_PLACEHOLDER);
        assert_eq!(*model.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn process_messages_compacts_when_pruning_insufficient() {
        let mgr = manager_200k();
        // Two exempt turns carry 90k tokens each (over 85% by themselves);
        // one old prunable turn lets pruning run first, but the pruned
        // conversation stays over the compaction threshold.
        let mut messages = Vec::new();
        messages.extend(turn(1, 200_000));
        messages.extend(turn(2, 360_000));
        messages.extend(turn(3, 360_000));
        let model = FakeModel::ok("summary of the session");
        let (out, action) = mgr.process_messages(messages, &model).await;
        assert_eq!(action, ContextAction::Compacted);
        assert_eq!(out.len(), 3);
        assert_eq!(*model.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn process_messages_compaction_failure_falls_back() {
        let mgr = manager_200k();
        let mut messages = Vec::new();
        messages.extend(turn(1, 360_000));
        messages.extend(turn(2, 360_000));
        let model = FakeModel::failing("HTTP 500");
        let (out, action) = mgr.process_messages(messages.clone(), &model).await;
        // Nothing prunable (both turns exempt), compaction failed: history
        // survives intact.
        assert_eq!(action, ContextAction::None);
        assert_eq!(out, messages);
    }

    #[test]
    fn stats_counts_everything() {
        let mgr = manager_200k();
        let mut messages = Vec::new();
        for n in 1..=4 {
            messages.extend(turn(n, 200_000));
        }
        let (pruned, count, _) = mgr.prune_tool_outputs(&messages);
        assert_eq!(count, 2);

        let stats = mgr.stats(&pruned);
        assert_eq!(stats.message_count, 12);
        assert_eq!(stats.tool_result_parts, 4);
        assert_eq!(stats.pruned_outputs, 2);
        assert_eq!(stats.usable_context, 200_000);
        assert_eq!(stats.context_window, 208_192);
        assert_eq!(stats.output_reserve, 8_192);
        assert!(stats.usage_pct > 0);
    }

    #[test]
    fn end_to_end_prune_scenario() {
        // Three turns, each answering a tool call with a 200k-char result
        // (50k tokens). After the third turn the conversation exceeds 70%
        // of the 200k usable context; pruning clears turn 1's result while
        // turns 2 and 3 stay intact inside the recency window.
        let mgr = manager_200k();
        let mut messages = Vec::new();
        for n in 1..=3 {
            messages.extend(turn(n, 200_000));
        }

        assert!(mgr.should_prune(&messages));

        let (pruned, count, saved) = mgr.prune_tool_outputs(&messages);
        assert_eq!(count, 1);
        assert_eq!(saved, 50_000);
        assert_eq!(find_result_output(&pruned, "call-1"), PRUNED_PLACEHOLDER);
        assert_eq!(find_result_output(&pruned, "call-2").len(), 200_000);
        assert_eq!(find_result_output(&pruned, "call-3").len(), 200_000);

        let stats = mgr.stats(&pruned);
        assert_eq!(stats.pruned_outputs, 1);
    }
}
