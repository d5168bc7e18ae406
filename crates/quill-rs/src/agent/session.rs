//! The session loop: one conversation, one model, one tool registry.
//!
//! [`Session`] owns the conversation and drives the agent loop for each
//! user turn: it conditions the history through the
//! [`ContextManager`](crate::context::manager::ContextManager), streams a
//! model response, executes any requested tool calls strictly in order,
//! feeds the results back, and repeats until the model stops calling tools
//! or the step cap is reached.

use std::mem;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::agent::events::{AgentEvent, EventHandler, NoopHandler};
use crate::agent::prompt::default_system_prompt;
use crate::context::manager::{ContextAction, ContextManager, ContextStats};
use crate::context::PRUNE_THRESHOLD;
use crate::provider::{GenerateRequest, LanguageModel};
use crate::tools::{ToolContext, ToolRegistry};
use crate::{ContentPart, Message};

/// Maximum model calls per user turn. Reaching the cap ends the turn
/// normally; it is not an error.
pub const DEFAULT_MAX_STEPS: u32 = 20;

/// Default output-token ceiling per model call.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8_192;

// ── Configuration ──────────────────────────────────────────────────

/// Configuration for a [`Session`].
///
/// # Example
///
/// ```ignore
/// let config = SessionConfig::new("anthropic/claude-sonnet-4")
///     .with_workdir("/path/to/project")
///     .with_max_steps(10);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model id, e.g. `"anthropic/claude-sonnet-4"`.
    pub model: String,
    /// Working directory tools execute against.
    pub workdir: PathBuf,
    /// Override the default system prompt.
    pub system_prompt: Option<String>,
    /// Maximum model calls per user turn.
    pub max_steps: u32,
    /// Output-token ceiling per model call. Defaults to the model's
    /// output reserve.
    pub max_output_tokens: Option<u32>,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            workdir: PathBuf::from("."),
            system_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
            max_output_tokens: None,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }
}

// ── Session ────────────────────────────────────────────────────────

/// An interactive conversation bound to one model and one tool registry.
///
/// The session owns the only live copy of the conversation; context
/// maintenance replaces it wholesale rather than mutating shared state.
pub struct Session {
    config: SessionConfig,
    messages: Vec<Message>,
    manager: ContextManager,
    tools: ToolRegistry,
    tool_ctx: ToolContext,
    model: Box<dyn LanguageModel>,
    handler: Box<dyn EventHandler>,
    warned_context: bool,
}

impl Session {
    /// Create a session. The context manager is bound to the configured
    /// model id's limits.
    pub fn new(config: SessionConfig, model: Box<dyn LanguageModel>, tools: ToolRegistry) -> Self {
        let manager = ContextManager::new(&config.model);
        let tool_ctx = ToolContext::new(&config.workdir);
        Self {
            config,
            messages: Vec::new(),
            manager,
            tools,
            tool_ctx,
            model,
            handler: Box::new(NoopHandler),
            warned_context: false,
        }
    }

    /// Attach an event handler (builder pattern).
    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Override the context manager, e.g. with custom limits in tests.
    pub fn with_context_manager(mut self, manager: ContextManager) -> Self {
        self.manager = manager;
        self
    }

    /// The conversation so far.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Context statistics for the current conversation.
    pub fn stats(&self) -> ContextStats {
        self.manager.stats(&self.messages)
    }

    /// Clear the conversation, starting the session fresh.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.warned_context = false;
        info!("Conversation cleared");
    }

    /// Run one user turn to completion.
    ///
    /// Appends the user message, conditions the history, then loops:
    /// model call, sequential tool execution, results appended as one
    /// user-role message. Returns the final assistant text. A provider
    /// error aborts the turn with everything accumulated so far retained,
    /// so the next turn can continue from consistent history.
    pub async fn run_turn(&mut self, user_text: &str) -> Result<String, String> {
        self.messages.push(Message::user(user_text));

        let conversation = mem::take(&mut self.messages);
        let (conditioned, action) = self
            .manager
            .process_messages(conversation, self.model.as_ref())
            .await;
        self.messages = conditioned;
        if action != ContextAction::None {
            self.handler
                .on_event(&AgentEvent::ContextMaintained { action });
        }

        self.warn_if_context_high();

        let system_owned;
        let system = match &self.config.system_prompt {
            Some(p) => p.as_str(),
            None => {
                system_owned =
                    default_system_prompt(&self.config.workdir, &self.tools.definitions());
                system_owned.as_str()
            }
        };
        let max_output_tokens = self
            .config
            .max_output_tokens
            .unwrap_or_else(|| self.manager.limits().output_reserve);

        let mut final_text = String::new();

        for step in 1..=self.config.max_steps {
            self.handler.on_event(&AgentEvent::StepStart {
                step,
                max_steps: self.config.max_steps,
            });

            let handler = self.handler.as_ref();
            let on_text = |delta: &str| handler.on_event(&AgentEvent::TextDelta(delta));
            let request = GenerateRequest {
                system,
                messages: &self.messages,
                tools: self.tools.definitions(),
                max_output_tokens,
            };
            let turn = self.model.generate(request, &on_text).await?;

            if let Some(usage) = turn.usage {
                self.handler.on_event(&AgentEvent::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                });
            }

            let text = turn.text();
            if !text.is_empty() {
                self.handler.on_event(&AgentEvent::Text(&text));
                final_text = text;
            }

            let assistant = Message::assistant(turn.parts);
            let calls: Vec<(String, String, serde_json::Value)> = assistant
                .parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolCall {
                        id,
                        name,
                        arguments,
                    } => Some((id.clone(), name.clone(), arguments.clone())),
                    _ => None,
                })
                .collect();
            self.messages.push(assistant);

            if calls.is_empty() {
                self.handler
                    .on_event(&AgentEvent::TurnEnd { steps_used: step });
                return Ok(final_text);
            }

            // Strictly sequential: a later call may depend on an earlier
            // call's side effect (edit after read).
            let mut results = Vec::with_capacity(calls.len());
            for (id, name, arguments) in calls {
                let args_str =
                    serde_json::to_string(&arguments).unwrap_or_else(|_| "{}".to_string());
                self.handler.on_event(&AgentEvent::ToolStart {
                    name: &name,
                    arguments: &args_str,
                });

                let outcome = self.tools.execute(&name, &args_str, &self.tool_ctx).await;

                self.handler.on_event(&AgentEvent::ToolEnd {
                    name: &name,
                    call_id: &id,
                    output: &outcome.output,
                    is_error: outcome.is_error,
                });
                results.push(ContentPart::tool_result(id, outcome.output, outcome.is_error));
            }
            self.messages.push(Message::tool_results(results));
        }

        debug!(
            "Step cap ({}) reached; ending turn",
            self.config.max_steps
        );
        self.handler.on_event(&AgentEvent::TurnEnd {
            steps_used: self.config.max_steps,
        });
        Ok(final_text)
    }

    /// Emit a one-time warning when context usage crosses the prune
    /// threshold.
    fn warn_if_context_high(&mut self) {
        if self.warned_context {
            return;
        }
        let stats = self.manager.stats(&self.messages);
        let threshold_pct = (PRUNE_THRESHOLD * 100.0) as u32;
        if stats.usage_pct > threshold_pct {
            warn!(
                "Context usage at {}% of {} usable tokens",
                stats.usage_pct, stats.usable_context
            );
            self.handler.on_event(&AgentEvent::ContextWarning {
                usage_pct: stats.usage_pct,
            });
            self.warned_context = true;
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
