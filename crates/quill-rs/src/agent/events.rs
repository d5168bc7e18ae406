//! Events and handlers for the [`Session`](super::session::Session) loop.
//!
//! The session communicates with callers through [`AgentEvent`] variants
//! covering the turn lifecycle: model text streaming in, tools starting and
//! finishing, context maintenance, and usage. Callers implement
//! [`EventHandler`] to observe these for logging, terminal rendering, or
//! metrics.
//!
//! Events are observational only. Approval decisions go through the
//! [`Prompter`](crate::permission::Prompter), not the event stream, so a
//! handler can never accidentally approve a mutation by ignoring an event.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnHandler`] | Quick closures for simple callbacks |
//! | Custom `impl EventHandler` | Full control (REPL rendering, metrics) |

use crate::context::ContextAction;
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the session during a turn.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A model call is starting. Steps are 1-based.
    StepStart { step: u32, max_steps: u32 },
    /// Incremental text delta, streamed as it arrives off the wire.
    TextDelta(&'a str),
    /// The model produced a complete text block (may be alongside tool calls).
    Text(&'a str),
    /// A tool is about to execute.
    ToolStart { name: &'a str, arguments: &'a str },
    /// A tool finished executing.
    ToolEnd {
        name: &'a str,
        call_id: &'a str,
        output: &'a str,
        is_error: bool,
    },
    /// Context usage crossed the warning threshold. Fired at most once
    /// per session.
    ContextWarning { usage_pct: u32 },
    /// Context maintenance ran before the turn (pruning or compaction).
    ContextMaintained { action: ContextAction },
    /// Token usage reported by the provider for one model call.
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// The turn finished after `steps_used` model calls.
    TurnEnd { steps_used: u32 },
}

/// Handler for session events.
///
/// All methods are informational; the default implementation does nothing.
pub trait EventHandler: Send + Sync {
    /// Called for each event during a turn.
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// Wraps a `Fn(&AgentEvent)` closure into an [`EventHandler`], avoiding a
/// struct and impl for simple observation:
///
/// ```ignore
/// let handler = FnHandler::new(|event| {
///     if let AgentEvent::TextDelta(delta) = event {
///         print!("{delta}");
///     }
/// });
/// ```
pub struct FnHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that logs through `tracing`.
///
/// Deltas are skipped (they arrive character-by-character); complete text,
/// tool activity, and context maintenance are logged at INFO or DEBUG.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::StepStart { step, max_steps } => {
                debug!("Step {step}/{max_steps}");
            }
            AgentEvent::TextDelta(_) => {}
            AgentEvent::Text(text) => {
                info!("Model: {}", text.chars().take(200).collect::<String>());
            }
            AgentEvent::ToolStart { name, arguments } => {
                info!(
                    "Tool {name}({})",
                    arguments.chars().take(120).collect::<String>()
                );
            }
            AgentEvent::ToolEnd {
                name,
                output,
                is_error,
                ..
            } => {
                if *is_error {
                    warn!("Tool {name} failed: {}", output.chars().take(200).collect::<String>());
                } else {
                    debug!("Tool {name} returned {} bytes", output.len());
                }
            }
            AgentEvent::ContextWarning { usage_pct } => {
                warn!("Context usage at {usage_pct}%");
            }
            AgentEvent::ContextMaintained { action } => {
                info!("Context maintenance: {action:?}");
            }
            AgentEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                debug!("Usage: {input_tokens} in, {output_tokens} out");
            }
            AgentEvent::TurnEnd { steps_used } => {
                debug!("Turn finished after {steps_used} step(s)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fn_handler_observes_events() {
        let seen = Mutex::new(Vec::new());
        let handler = FnHandler::new(|event: &AgentEvent<'_>| {
            if let AgentEvent::TextDelta(delta) = event {
                seen.lock().unwrap().push(delta.to_string());
            }
        });

        handler.on_event(&AgentEvent::TextDelta("a"));
        handler.on_event(&AgentEvent::TurnEnd { steps_used: 1 });
        handler.on_event(&AgentEvent::TextDelta("b"));

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn noop_handler_ignores_everything() {
        NoopHandler.on_event(&AgentEvent::StepStart {
            step: 1,
            max_steps: 20,
        });
        NoopHandler.on_event(&AgentEvent::ContextWarning { usage_pct: 99 });
    }
}
