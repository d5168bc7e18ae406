//! Convenience re-exports for common `quill-rs` types.
//!
//! Meant to be glob-imported when building agents:
//!
//! ```ignore
//! use quill_rs::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of programs: the
//! [`Session`] and its config, [`Message`] constructors, the [`Tool`] trait
//! and [`ToolRegistry`], event handlers, the permission gate, and the
//! context manager. Specialized types (stream events, the estimator
//! internals) are intentionally excluded; import those from their modules
//! directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ContentPart, Message, Role, json_schema_for};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    AgentEvent, EventHandler, FnHandler, LoggingHandler, NoopHandler, Session, SessionConfig,
    SystemPromptBuilder,
};

// ── Context management ──────────────────────────────────────────────
pub use crate::context::{ContextAction, ContextLimits, ContextManager, ContextStats};

// ── Provider ────────────────────────────────────────────────────────
pub use crate::provider::{GenerateRequest, LanguageModel, ModelTurn, OpenRouterModel};

// ── Permission ──────────────────────────────────────────────────────
pub use crate::permission::{AlwaysDeny, Answer, PermissionGate, Prompter, is_dangerous};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    Tool, ToolContext, ToolDef, ToolFuture, ToolOutcome, ToolRegistry, parse_tool_args,
};
