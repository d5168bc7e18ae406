//! Tool abstraction for function-calling agents.
//!
//! The [`Tool`] trait defines the interface every tool implements: a static
//! definition (name, description, JSON Schema) and an async `execute` method.
//! Tools are collected into a [`ToolRegistry`] which handles dispatch,
//! definition export, argument validation, and result truncation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::permission::PermissionGate;

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`Tool::execute`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolOutcome> + Send + 'a>>;

// ── Definitions and outcomes ───────────────────────────────────────

/// A tool definition sent to the model API.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDef {
    /// Unique tool name, e.g. `"read_file"`.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema for the tool's argument object.
    pub parameters: serde_json::Value,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Ambient state a tool executes against.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working directory that relative paths resolve against.
    pub workdir: PathBuf,
    /// Cancelled when the session is interrupted; long-running tools
    /// should stop promptly.
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            cancel: CancellationToken::new(),
        }
    }
}

/// The result of one tool execution.
///
/// Failures are data, not `Err`: the output string goes back to the model
/// either way, and `is_error` lets the caller and event stream distinguish
/// the two.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub output: String,
    pub is_error: bool,
}

impl ToolOutcome {
    /// A successful outcome.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// A failed outcome. The message is prefixed with `"Error: "` if it
    /// does not already carry one, so the model sees a consistent shape.
    pub fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        let output = if message.starts_with("Error") {
            message
        } else {
            format!("Error: {message}")
        };
        Self {
            output,
            is_error: true,
        }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool the model can invoke via function-calling.
///
/// Implementors provide a static definition ([`Tool::definition`]) and an
/// async [`Tool::execute`] that receives the raw JSON arguments string plus
/// the execution context. Failures are reported through
/// [`ToolOutcome::err`] rather than panicking; the registry passes the
/// output back to the model regardless.
///
/// Uses a boxed future so the trait is dyn-compatible (object-safe).
pub trait Tool: Send + Sync {
    /// The tool definition sent to the model API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the given raw JSON arguments string.
    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a>;

    /// The tool's name (delegates to the definition).
    fn name(&self) -> String {
        self.definition().name
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// A collection of tools dispatched by name.
///
/// Manages registration, definition export for the model API, and dispatch
/// with schema validation, timing, and truncation. This is the tool-side
/// counterpart to the [`Session`](crate::agent::session::Session) loop.
///
/// # Example
///
/// ```ignore
/// let gate = Arc::new(PermissionGate::new(TerminalPrompter));
/// let tools = ToolRegistry::new()
///     .with_max_result_bytes(15_000)
///     .with_common_tools(&gate)
///     .with(MyCustomTool::new());
/// let defs = tools.definitions();
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    max_result_bytes: usize,
    /// Whether to validate arguments against JSON Schema before execution.
    validate_args: bool,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry with argument validation enabled.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: true,
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable or disable JSON Schema argument validation.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Conditionally register a tool (builder pattern).
    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    /// Register the built-in file and shell tools
    /// ([`ReadFile`], [`WriteFile`], [`EditFile`], [`Glob`], [`Grep`],
    /// [`Bash`]), sharing one permission gate.
    ///
    /// [`ReadFile`]: crate::tools::common::ReadFile
    /// [`WriteFile`]: crate::tools::common::WriteFile
    /// [`EditFile`]: crate::tools::common::EditFile
    /// [`Glob`]: crate::tools::common::Glob
    /// [`Grep`]: crate::tools::common::Grep
    /// [`Bash`]: crate::tools::common::Bash
    pub fn with_common_tools(self, gate: &Arc<PermissionGate>) -> Self {
        use crate::tools::common::{Bash, EditFile, Glob, Grep, ReadFile, WriteFile};
        self.with(ReadFile)
            .with(WriteFile::new(Arc::clone(gate)))
            .with(EditFile::new(Arc::clone(gate)))
            .with(Glob)
            .with(Grep)
            .with(Bash::new(Arc::clone(gate)))
    }

    /// Return all tool definitions for the model API, sorted by name so
    /// the prompt is stable across runs.
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name, with validation, timing, and truncation.
    ///
    /// Unknown tool names and schema violations come back as error outcomes
    /// so the model can self-correct.
    pub async fn execute(&self, name: &str, arguments: &str, ctx: &ToolContext) -> ToolOutcome {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => return ToolOutcome::err(format!("unknown tool '{name}'")),
        };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), arguments)
        {
            return ToolOutcome::err(error);
        }

        log_tool_call(name, arguments);
        let start = Instant::now();

        let mut outcome = tool.execute(arguments, ctx).await;

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes, error={})",
            start.elapsed().as_secs_f64() * 1000.0,
            outcome.output.len(),
            outcome.is_error,
        );
        trace!(
            "Tool {name} result preview: {}",
            outcome.output.chars().take(300).collect::<String>()
        );

        outcome.output = truncate_result(outcome.output, self.max_result_bytes);
        outcome
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(error_string)` formatted for the
/// model to understand and self-correct.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let args_value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "invalid JSON arguments for tool '{}': {e}. \
                 Please provide valid JSON matching the tool's parameter schema.",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().parameters;

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return None, // If the schema itself is invalid, skip validation.
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "argument validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.len() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes, appending a notice if trimmed.
///
/// The cut is pulled back to a UTF-8 boundary so truncation never splits
/// a multi-byte character.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n[truncated: {} bytes total]", &s[..cut], s.len())
}

/// Parse raw JSON arguments into a typed struct.
///
/// Returns a formatted error string suitable for wrapping in
/// [`ToolOutcome::err`]; the model will see the error and self-correct.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "echo",
                "Echo the input",
                serde_json::json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            )
        }

        fn execute<'a>(&'a self, arguments: &'a str, _ctx: &'a ToolContext) -> ToolFuture<'a> {
            Box::pin(async move {
                let args: serde_json::Value =
                    serde_json::from_str(arguments).unwrap_or_default();
                match args.get("text").and_then(|v| v.as_str()) {
                    Some(text) => ToolOutcome::ok(text),
                    None => ToolOutcome::err("no text"),
                }
            })
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(".")
    }

    #[test]
    fn tool_name_from_definition() {
        assert_eq!(EchoTool.name(), "echo");
    }

    #[test]
    fn outcome_err_prefixes_message() {
        assert_eq!(ToolOutcome::err("bad path").output, "Error: bad path");
        assert_eq!(ToolOutcome::err("Error: already").output, "Error: already");
        assert!(ToolOutcome::err("x").is_error);
        assert!(!ToolOutcome::ok("x").is_error);
    }

    #[test]
    fn registry_definitions_sorted_by_name() {
        struct Zeta;
        impl Tool for Zeta {
            fn definition(&self) -> ToolDef {
                ToolDef::new("zeta", "z", serde_json::json!({"type": "object"}))
            }
            fn execute<'a>(&'a self, _a: &'a str, _c: &'a ToolContext) -> ToolFuture<'a> {
                Box::pin(async { ToolOutcome::ok("") })
            }
        }
        let set = ToolRegistry::new().with(Zeta).with(EchoTool);
        let defs = set.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "zeta"]);
    }

    #[tokio::test]
    async fn registry_execute_known_tool() {
        let set = ToolRegistry::new().with(EchoTool);
        let result = set.execute("echo", r#"{"text": "hello"}"#, &ctx()).await;
        assert_eq!(result.output, "hello");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn registry_execute_unknown_tool() {
        let set = ToolRegistry::new().with(EchoTool);
        let result = set.execute("nonexistent", "{}", &ctx()).await;
        assert!(result.is_error);
        assert!(result.output.contains("unknown tool"));
    }

    #[tokio::test]
    async fn registry_validates_arguments() {
        let set = ToolRegistry::new().with(EchoTool);

        let result = set.execute("echo", r#"{"wrong": 1}"#, &ctx()).await;
        assert!(result.is_error);
        assert!(result.output.contains("argument validation failed"));

        let result = set.execute("echo", "not json", &ctx()).await;
        assert!(result.is_error);
        assert!(result.output.contains("invalid JSON arguments"));
    }

    #[tokio::test]
    async fn registry_validation_can_be_disabled() {
        let set = ToolRegistry::new().with_arg_validation(false).with(EchoTool);
        let result = set.execute("echo", r#"{"wrong": 1}"#, &ctx()).await;
        // The tool itself reports the missing field instead.
        assert!(result.is_error);
        assert!(result.output.contains("no text"));
    }

    #[tokio::test]
    async fn registry_truncates_long_results() {
        struct BigTool;
        impl Tool for BigTool {
            fn definition(&self) -> ToolDef {
                ToolDef::new("big", "Big result", serde_json::json!({"type": "object"}))
            }
            fn execute<'a>(&'a self, _a: &'a str, _c: &'a ToolContext) -> ToolFuture<'a> {
                Box::pin(async { ToolOutcome::ok("a".repeat(200)) })
            }
        }

        let set = ToolRegistry::new().with_max_result_bytes(50).with(BigTool);
        let result = set.execute("big", "{}", &ctx()).await;
        assert!(result.output.contains("[truncated: 200 bytes total]"));
    }

    #[test]
    fn truncate_short_unchanged() {
        assert_eq!(truncate_result("hello".into(), 100), "hello");
    }

    #[test]
    fn truncate_long_is_cut() {
        let s = "a".repeat(200);
        let result = truncate_result(s, 50);
        assert!(result.starts_with(&"a".repeat(50)));
        assert!(result.contains("[truncated: 200 bytes total]"));
    }

    #[test]
    fn truncate_respects_utf8_boundaries() {
        let s = "é".repeat(30); // 2 bytes each
        let result = truncate_result(s, 31);
        assert!(result.contains("[truncated: 60 bytes total]"));
    }

    #[test]
    fn with_if_registers_conditionally() {
        assert_eq!(ToolRegistry::new().with_if(true, EchoTool).len(), 1);
        assert_eq!(ToolRegistry::new().with_if(false, EchoTool).len(), 0);
    }

    #[test]
    fn parse_tool_args_reports_errors() {
        #[derive(Debug, serde::Deserialize)]
        struct Args {
            #[allow(dead_code)]
            path: String,
        }
        assert!(parse_tool_args::<Args>(r#"{"path": "a"}"#).is_ok());
        let err = parse_tool_args::<Args>("{}").unwrap_err();
        assert!(err.contains("invalid tool arguments"));
    }
}
