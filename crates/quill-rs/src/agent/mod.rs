//! The agent loop: sessions, events, and prompt assembly.
//!
//! - [`session`]: [`Session`] owns the conversation and drives the
//!   model/tool loop for each user turn.
//! - [`events`]: [`AgentEvent`] and [`EventHandler`] for observing turns.
//! - [`prompt`]: [`SystemPromptBuilder`] and the default system prompt.

pub mod events;
pub mod prompt;
pub mod session;

// Re-export commonly used items at the module level.
pub use events::{AgentEvent, EventHandler, FnHandler, LoggingHandler, NoopHandler};
pub use prompt::{SystemPromptBuilder, default_system_prompt};
pub use session::{DEFAULT_MAX_STEPS, Session, SessionConfig};
