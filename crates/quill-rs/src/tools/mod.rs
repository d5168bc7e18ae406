//! Tool system: the [`Tool`] trait, dispatch via [`ToolRegistry`], and the
//! built-in file and shell tools.
//!
//! - [`core`]: the [`Tool`] trait, [`ToolDef`] definitions, execution
//!   context and outcomes, and the [`ToolRegistry`] with schema validation
//!   and result truncation.
//! - [`common`]: `read_file`, `write_file`, `edit_file`, `glob`, `grep`,
//!   and `bash`, with permission-gated mutations.

pub mod common;
pub mod core;

// Re-export commonly used items at the module level.
pub use common::{Bash, EditFile, Glob, Grep, ReadFile, WriteFile};
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, Tool, ToolContext, ToolDef, ToolFuture, ToolOutcome, ToolRegistry,
    parse_tool_args, truncate_result, validate_tool_arguments,
};
