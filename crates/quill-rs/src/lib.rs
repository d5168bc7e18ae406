//! Conversation-context and tool-orchestration engine for coding agents.
//!
//! `quill-rs` drives the request/response/tool-call loop of an interactive
//! coding assistant: a user converses with a language model that can invoke
//! file and shell tools against a project. The core abstraction is the
//! [`Session`](agent::session::Session): it appends the user turn, asks the
//! [`ContextManager`](context::ContextManager) to condition the history,
//! streams a model turn, resolves tool calls through the
//! [`ToolRegistry`](tools::core::ToolRegistry), and repeats until the model
//! produces no further tool calls.
//!
//! # Getting started
//!
//! ```ignore
//! use quill_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENROUTER_KEY").unwrap();
//!     let model = OpenRouterModel::new(api_key, "anthropic/claude-sonnet-4")?;
//!
//!     let gate = std::sync::Arc::new(PermissionGate::new(AlwaysDeny));
//!     let tools = ToolRegistry::new().with_common_tools(&gate);
//!
//!     let config = SessionConfig::new("anthropic/claude-sonnet-4");
//!     let mut session = Session::new(config, Box::new(model), tools);
//!
//!     let reply = session.run_turn("Read src/main.rs and summarize it.").await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **The agent loop:** [`Session`](agent::session::Session) and
//!   [`SessionConfig`](agent::session::SessionConfig). Observe it via
//!   [`EventHandler`](agent::events::EventHandler).
//! - **Context management:** [`ContextManager`](context::ContextManager) for
//!   the prune/compact policy, [`context::estimator`] for token estimation,
//!   [`context::limits`] for per-model window sizes.
//! - **Tools:** the [`Tool`](tools::core::Tool) trait,
//!   [`ToolRegistry`](tools::core::ToolRegistry) for dispatch, and
//!   [`tools::common`] for built-in file and shell tools.
//! - **Dangerous-action gating:** [`PermissionGate`](permission::PermissionGate)
//!   and [`is_dangerous`](permission::is_dangerous).
//! - **Model transport:** the [`LanguageModel`](provider::LanguageModel)
//!   capability and the [`OpenRouterModel`](provider::OpenRouterModel) client
//!   with SSE streaming.
//!
//! # Design principles
//!
//! 1. **The session owns the conversation.** Conditioning steps (pruning,
//!    compaction) return a new history that replaces the old one wholesale;
//!    nothing mutates a shared message array behind the caller's back.
//!
//! 2. **Content is a tagged union.** A message part is text, a tool call, or
//!    a tool result, never an untyped blob. Every consumer (estimator,
//!    pruner, session, wire codec) matches exhaustively.
//!
//! 3. **Tool failures stay in-band.** Tools never propagate errors across
//!    the registry boundary; every failure becomes an error-flagged result
//!    the model can react to.
//!
//! 4. **Context is the scarcest resource.** Estimation is cheap and
//!    approximate by design; pruning is preferred over compaction because it
//!    preserves conversational structure.

pub mod agent;
pub mod context;
pub mod permission;
pub mod prelude;
pub mod provider;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types
/// and the schema the tool-calling API expects.
///
/// # Example
///
/// ```
/// use quill_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct GrepArgs {
///     pattern: String,
///     #[serde(default)]
///     path: Option<String>,
/// }
///
/// let schema = json_schema_for::<GrepArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"pattern".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
///
/// Only user and assistant roles exist at this layer; system instructions
/// and per-call tool plumbing are wire-level concerns handled by the
/// provider.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One ordered part of a message's content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },
    /// A model-issued request to invoke a named tool.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// The output of a tool call, keyed by the originating call id.
    ToolResult {
        id: String,
        output: String,
        is_error: bool,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        ContentPart::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_result(id: impl Into<String>, output: impl Into<String>, is_error: bool) -> Self {
        ContentPart::ToolResult {
            id: id.into(),
            output: output.into(),
            is_error,
        }
    }
}

/// A message in the conversation: one turn's worth of ordered parts.
///
/// Invariant maintained by the session: every `ToolCall` part emitted by the
/// assistant is answered, in the next user-role message, by exactly one
/// `ToolResult` part sharing its call id before another model turn is
/// requested.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    /// A user message containing a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::text(text)],
        }
    }

    /// An assistant message containing a single text part.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::text(text)],
        }
    }

    /// An assistant message with arbitrary parts (text and/or tool calls).
    pub fn assistant(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Assistant,
            parts,
        }
    }

    /// A user-role message carrying tool results back to the model.
    pub fn tool_results(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Concatenated text content of all `Text` parts.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }

    /// All `ToolCall` parts, in emission order.
    pub fn tool_calls(&self) -> Vec<&ContentPart> {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::ToolCall { .. }))
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ContentPart::ToolCall { .. }))
    }

    pub fn has_tool_results(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ContentPart::ToolResult { .. }))
    }

    /// Whether this is a real user prompt (user role, no tool-result parts).
    ///
    /// Distinguishes the user's own turns from the user-role messages the
    /// session synthesizes to carry tool results.
    pub fn is_user_prompt(&self) -> bool {
        self.role == Role::User && !self.has_tool_results()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.text(), "hello");
        assert!(user.is_user_prompt());

        let assist = Message::assistant_text("hi there");
        assert_eq!(assist.role, Role::Assistant);
        assert_eq!(assist.text(), "hi there");
        assert!(!assist.has_tool_calls());

        let results = Message::tool_results(vec![ContentPart::tool_result("c1", "ok", false)]);
        assert_eq!(results.role, Role::User);
        assert!(results.has_tool_results());
        assert!(!results.is_user_prompt());
    }

    #[test]
    fn assistant_with_tool_calls() {
        let msg = Message::assistant(vec![
            ContentPart::text("Let me check."),
            ContentPart::tool_call("c1", "read_file", serde_json::json!({"path": "src/lib.rs"})),
        ]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.text(), "Let me check.");
    }

    #[test]
    fn content_part_serde_tagging() {
        let part = ContentPart::tool_result("c9", "done", false);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["id"], "c9");
        assert_eq!(json["is_error"], false);

        let back: ContentPart = serde_json::from_value(json).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::user("x");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
    }
}
