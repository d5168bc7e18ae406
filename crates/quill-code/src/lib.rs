//! Terminal coding agent powered by quill-rs.
//!
//! `quill-code` provides a ready-to-use interactive coding agent with git
//! awareness, built on the quill-rs session engine.
//!
//! # Library usage
//!
//! Use the library components to build custom coding agents:
//!
//! ```ignore
//! use quill_code::{CodeConfig, GitToolsExt, TerminalPrompter};
//! use quill_rs::prelude::*;
//! use std::sync::Arc;
//!
//! // Batteries-included setup.
//! let config = CodeConfig::default();
//! let gate = Arc::new(PermissionGate::new(TerminalPrompter));
//! let tools = config.build_tool_registry(&gate);
//! let session_config = config.build_session_config();
//!
//! // Or add git tools to an existing registry.
//! let tools = ToolRegistry::new()
//!     .with_common_tools(&gate)
//!     .with_git_tools();
//! ```
//!
//! # Binary
//!
//! The `quill-code` binary is an interactive REPL:
//!
//! ```sh
//! quill-code --workdir /path/to/project
//! quill-code --model openai/gpt-4o --verbose
//! ```

pub mod config;
pub mod prompter;
pub mod tools;

pub use config::CodeConfig;
pub use prompter::TerminalPrompter;
pub use tools::GitToolsExt;
