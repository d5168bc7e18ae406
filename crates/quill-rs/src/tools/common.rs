//! Built-in file and shell tools.
//!
//! These are the standard coding-agent tools that any session can register
//! via [`ToolRegistry::with_common_tools`](crate::tools::core::ToolRegistry::with_common_tools).
//! All paths resolve against the [`ToolContext`](crate::tools::core::ToolContext)
//! working directory; traversal (`..`) is blocked.
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`ReadFile`] | `read_file` | Read a file, optionally a line range |
//! | [`WriteFile`] | `write_file` | Create or overwrite a file |
//! | [`EditFile`] | `edit_file` | Exact-match text replacement |
//! | [`Glob`] | `glob` | Glob-based file search |
//! | [`Grep`] | `grep` | Regex search in file contents |
//! | [`Bash`] | `bash` | Execute shell commands |
//!
//! The mutating tools ([`WriteFile`], [`EditFile`], [`Bash`]) share a
//! [`PermissionGate`]: overwrites, edits, and dangerous commands go to the
//! user for approval before anything touches disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use similar::TextDiff;
use tokio::fs;
use tokio::process::Command;

use crate::json_schema_for;
use crate::permission::{PermissionGate, is_dangerous};
use crate::tools::core::{Tool, ToolContext, ToolDef, ToolFuture, ToolOutcome, parse_tool_args};

// ── Defaults ────────────────────────────────────────────────────────

/// Default maximum grep matches per file before truncation.
pub const DEFAULT_MAX_GREP_MATCHES: u32 = 200;

/// Default maximum glob results.
pub const DEFAULT_MAX_GLOB_RESULTS: u32 = 100;

/// Default timeout for `bash` commands.
pub const DEFAULT_BASH_TIMEOUT: Duration = Duration::from_secs(120);

// ── Typed argument structs ──────────────────────────────────────────

/// Typed arguments for `read_file`.
#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File path relative to the working directory (e.g. 'src/main.rs').
    pub path: String,
    /// 1-based line to start reading from (default 1).
    #[serde(default)]
    pub offset: Option<usize>,
    /// Maximum number of lines to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Typed arguments for `write_file`.
#[derive(Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// File path relative to the working directory.
    pub path: String,
    /// Full content to write. Replaces the file if it exists.
    pub content: String,
}

/// Typed arguments for `edit_file`.
#[derive(Deserialize, JsonSchema)]
pub struct EditFileArgs {
    /// File path relative to the working directory.
    pub path: String,
    /// Exact text to find. Must appear exactly once unless replace_all.
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
    /// Replace every occurrence instead of requiring a unique match.
    #[serde(default)]
    pub replace_all: Option<bool>,
}

/// Typed arguments for `glob`.
#[derive(Deserialize, JsonSchema)]
pub struct GlobArgs {
    /// Glob pattern relative to the working directory (e.g. 'src/**/*.rs').
    pub pattern: String,
}

/// Typed arguments for `grep`.
#[derive(Deserialize, JsonSchema)]
pub struct GrepArgs {
    /// Regex pattern to search for.
    pub pattern: String,
    /// Directory or file to search in (relative, default '.').
    #[serde(default)]
    pub path: Option<String>,
    /// File glob filter (e.g. '*.rs', '*.toml').
    #[serde(default)]
    pub glob: Option<String>,
    /// Case-insensitive search (default false).
    #[serde(default)]
    pub case_insensitive: Option<bool>,
}

/// Typed arguments for `bash`.
#[derive(Deserialize, JsonSchema)]
pub struct BashArgs {
    /// Shell command to execute (e.g. 'cargo check', 'git diff --stat').
    pub command: String,
    /// Timeout in seconds (default 120).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

// ── ReadFile ────────────────────────────────────────────────────────

/// Read a file from the working directory, optionally a line range.
pub struct ReadFile;

impl Tool for ReadFile {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "read_file",
            "Read a file from the working directory. Optionally pass 'offset' \
             (1-based starting line) and 'limit' (number of lines) to read a \
             slice of a large file.",
            json_schema_for::<ReadFileArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: ReadFileArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };
            let full_path = match resolve_path(&ctx.workdir, &args.path) {
                Ok(p) => p,
                Err(e) => return ToolOutcome::err(e),
            };

            // Catch directories early so the model gets an actionable hint
            // instead of the raw OS error ("Is a directory (os error 21)").
            if let Ok(meta) = fs::metadata(&full_path).await
                && meta.is_dir()
            {
                return ToolOutcome::err(format!(
                    "'{}' is a directory, not a file. Use glob to browse directories.",
                    args.path
                ));
            }

            let content = match fs::read_to_string(&full_path).await {
                Ok(c) => c,
                Err(e) => {
                    return ToolOutcome::err(format!("reading '{}': {e}", args.path));
                }
            };

            if args.offset.is_none() && args.limit.is_none() {
                return ToolOutcome::ok(content);
            }

            let lines: Vec<&str> = content.lines().collect();
            let total = lines.len();
            let start = args.offset.unwrap_or(1).max(1) - 1;
            if start >= total {
                return ToolOutcome::err(format!(
                    "offset {} is past the end of '{}' ({total} lines)",
                    start + 1,
                    args.path
                ));
            }
            let end = args.limit.map_or(total, |l| (start + l).min(total));
            let mut slice = lines[start..end].join("\n");
            slice.push_str(&format!("\n[lines {}-{end} of {total}]", start + 1));
            ToolOutcome::ok(slice)
        })
    }
}

// ── WriteFile ───────────────────────────────────────────────────────

/// Create or overwrite a file. Overwriting an existing file requires
/// approval through the permission gate; creating a new one does not.
pub struct WriteFile {
    gate: Arc<PermissionGate>,
}

impl WriteFile {
    pub fn new(gate: Arc<PermissionGate>) -> Self {
        Self { gate }
    }
}

impl Tool for WriteFile {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "write_file",
            "Write content to a file, creating it (and parent directories) if \
             needed. Overwriting an existing file asks the user for approval.",
            json_schema_for::<WriteFileArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: WriteFileArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };
            let full_path = match resolve_path(&ctx.workdir, &args.path) {
                Ok(p) => p,
                Err(e) => return ToolOutcome::err(e),
            };

            if fs::try_exists(&full_path).await.unwrap_or(false)
                && !self.gate.request_approval("write", &args.path)
            {
                return ToolOutcome::err(format!(
                    "user declined to overwrite '{}'",
                    args.path
                ));
            }

            if let Some(parent) = full_path.parent()
                && let Err(e) = fs::create_dir_all(parent).await
            {
                return ToolOutcome::err(format!(
                    "creating parent directories for '{}': {e}",
                    args.path
                ));
            }

            match fs::write(&full_path, &args.content).await {
                Ok(()) => ToolOutcome::ok(format!(
                    "Wrote {} bytes to '{}'",
                    args.content.len(),
                    args.path
                )),
                Err(e) => ToolOutcome::err(format!("writing '{}': {e}", args.path)),
            }
        })
    }
}

// ── EditFile ────────────────────────────────────────────────────────

/// Exact-match text replacement in an existing file.
///
/// Every edit requires approval; the user is shown a unified diff of the
/// proposed change, not the raw replacement strings.
pub struct EditFile {
    gate: Arc<PermissionGate>,
}

impl EditFile {
    pub fn new(gate: Arc<PermissionGate>) -> Self {
        Self { gate }
    }
}

impl Tool for EditFile {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "edit_file",
            "Replace exact text in a file. 'old_text' must match exactly and \
             appear exactly once, unless 'replace_all' is set. Every edit is \
             shown to the user as a diff for approval.",
            json_schema_for::<EditFileArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: EditFileArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };
            if args.old_text == args.new_text {
                return ToolOutcome::err("old_text and new_text are identical");
            }
            let full_path = match resolve_path(&ctx.workdir, &args.path) {
                Ok(p) => p,
                Err(e) => return ToolOutcome::err(e),
            };

            let content = match fs::read_to_string(&full_path).await {
                Ok(c) => c,
                Err(e) => {
                    return ToolOutcome::err(format!("reading '{}': {e}", args.path));
                }
            };

            let occurrences = content.matches(&args.old_text).count();
            let replace_all = args.replace_all.unwrap_or(false);
            let updated = match occurrences {
                0 => {
                    return ToolOutcome::err(format!(
                        "old_text not found in '{}'. Read the file and match the \
                         existing text exactly, including whitespace.",
                        args.path
                    ));
                }
                1 => content.replacen(&args.old_text, &args.new_text, 1),
                n if replace_all => {
                    let _ = n;
                    content.replace(&args.old_text, &args.new_text)
                }
                n => {
                    return ToolOutcome::err(format!(
                        "old_text appears {n} times in '{}'. Provide more \
                         surrounding context to make it unique, or set replace_all.",
                        args.path
                    ));
                }
            };

            let diff = TextDiff::from_lines(&content, &updated)
                .unified_diff()
                .context_radius(3)
                .header(&args.path, &args.path)
                .to_string();

            if !self.gate.request_approval("edit", &diff) {
                return ToolOutcome::err(format!("user declined the edit to '{}'", args.path));
            }

            match fs::write(&full_path, &updated).await {
                Ok(()) => ToolOutcome::ok(format!(
                    "Edited '{}' ({occurrences} replacement{})",
                    args.path,
                    if occurrences == 1 { "" } else { "s" }
                )),
                Err(e) => ToolOutcome::err(format!("writing '{}': {e}", args.path)),
            }
        })
    }
}

// ── Glob ────────────────────────────────────────────────────────────

/// Find files matching a glob pattern under the working directory.
pub struct Glob;

impl Tool for Glob {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "glob",
            "Find files matching a glob pattern (e.g. 'src/**/*.rs'). Returns \
             a sorted list of paths relative to the working directory.",
            json_schema_for::<GlobArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: GlobArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };
            if args.pattern.contains("..") {
                return ToolOutcome::err("path traversal not allowed");
            }
            // The pattern goes to find as a plain argument, never through a
            // shell, so metacharacters in it cannot execute anything.
            let pattern = &args.pattern;
            let output = match Command::new("find")
                .args([".", "-path", &format!("./{pattern}"), "-type", "f"])
                .current_dir(&ctx.workdir)
                .output()
                .await
            {
                Ok(o) => o,
                Err(e) => return ToolOutcome::err(format!("running find: {e}")),
            };

            // find reports unreadable directories on stderr and may exit
            // non-zero while still listing matches; stdout is authoritative.
            let stdout = String::from_utf8_lossy(&output.stdout);
            let mut paths: Vec<&str> = stdout.lines().collect();
            paths.sort_unstable();
            paths.truncate(DEFAULT_MAX_GLOB_RESULTS as usize);
            if paths.is_empty() {
                return ToolOutcome::ok(format!("No files found matching '{pattern}'"));
            }
            ToolOutcome::ok(paths.join("\n"))
        })
    }
}

// ── Grep ────────────────────────────────────────────────────────────

/// Regex search in file contents under the working directory.
pub struct Grep;

impl Tool for Grep {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "grep",
            "Search file contents for a regex pattern. Returns matching lines \
             prefixed with file:line_number. Supports an optional path, a file \
             glob filter, and case-insensitive search.",
            json_schema_for::<GrepArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: GrepArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };
            let search_path = args.path.as_deref().unwrap_or(".");
            if search_path.contains("..") {
                return ToolOutcome::err("path traversal not allowed");
            }

            let mut cmd_args = vec![
                "-rn".to_string(),
                "--color=never".to_string(),
                format!("--max-count={DEFAULT_MAX_GREP_MATCHES}"),
            ];
            if args.case_insensitive.unwrap_or(false) {
                cmd_args.push("-i".to_string());
            }
            if let Some(glob) = &args.glob {
                cmd_args.push(format!("--include={glob}"));
            }
            cmd_args.push("-e".to_string());
            cmd_args.push(args.pattern.clone());
            cmd_args.push(search_path.to_string());

            let arg_refs: Vec<&str> = cmd_args.iter().map(|s| s.as_str()).collect();
            // grep exits 1 for "no matches"; not an error.
            let outcome = run_command(&ctx.workdir, "grep", &arg_refs, &[1]).await;
            if !outcome.is_error && outcome.output.trim().is_empty() {
                return ToolOutcome::ok(format!("No matches for '{}'", args.pattern));
            }
            outcome
        })
    }
}

// ── Bash ────────────────────────────────────────────────────────────

/// Execute a shell command in the working directory.
///
/// Commands matching the dangerous-command patterns require approval
/// through the permission gate before running. Execution is bounded by a
/// timeout and by the context's cancellation token; the child process is
/// killed when either fires.
pub struct Bash {
    gate: Arc<PermissionGate>,
}

impl Bash {
    pub fn new(gate: Arc<PermissionGate>) -> Self {
        Self { gate }
    }
}

impl Tool for Bash {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "bash",
            "Run a shell command in the working directory and return its \
             output. Use for git, build tools, and anything not covered by a \
             dedicated tool. Destructive commands ask the user for approval.",
            json_schema_for::<BashArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: BashArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };

            if is_dangerous(&args.command) && !self.gate.request_approval("bash", &args.command) {
                return ToolOutcome::err(format!(
                    "user declined to run command: {}",
                    args.command
                ));
            }

            let timeout = args
                .timeout_secs
                .map_or(DEFAULT_BASH_TIMEOUT, Duration::from_secs);

            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(&args.command)
                .current_dir(&ctx.workdir)
                .kill_on_drop(true);

            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    ToolOutcome::err("command cancelled")
                }
                result = tokio::time::timeout(timeout, cmd.output()) => match result {
                    Ok(Ok(output)) => format_output(output, &[]),
                    Ok(Err(e)) => ToolOutcome::err(format!("failed to run command: {e}")),
                    Err(_) => ToolOutcome::err(format!(
                        "command timed out after {} seconds",
                        timeout.as_secs()
                    )),
                },
            }
        })
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Resolve a relative path against the working directory, rejecting
/// traversal and absolute paths.
fn resolve_path(workdir: &Path, path: &str) -> Result<PathBuf, String> {
    if path.contains("..") {
        return Err("path traversal not allowed".to_string());
    }
    if Path::new(path).is_absolute() {
        return Err(format!(
            "absolute paths not allowed; '{path}' must be relative to the working directory"
        ));
    }
    Ok(workdir.join(path))
}

/// Format command output into a tool outcome.
///
/// Exit codes in `lenient_exit_codes` (e.g. grep's 1 for "no matches")
/// are treated as success.
fn format_output(output: std::process::Output, lenient_exit_codes: &[i32]) -> ToolOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let ok = output.status.success()
        || output
            .status
            .code()
            .is_some_and(|c| lenient_exit_codes.contains(&c));
    if ok {
        if stderr.is_empty() {
            ToolOutcome::ok(stdout)
        } else {
            ToolOutcome::ok(format!("{stdout}\n[stderr]\n{stderr}"))
        }
    } else {
        ToolOutcome::err(format!(
            "Command failed ({}):\n{stdout}\n{stderr}",
            output.status
        ))
    }
}

/// Run a command with arguments in the given working directory.
async fn run_command(
    workdir: &Path,
    cmd: &str,
    args: &[&str],
    lenient_exit_codes: &[i32],
) -> ToolOutcome {
    match Command::new(cmd)
        .args(args)
        .current_dir(workdir)
        .output()
        .await
    {
        Ok(output) => format_output(output, lenient_exit_codes),
        Err(e) => ToolOutcome::err(format!("running {cmd}: {e}")),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
