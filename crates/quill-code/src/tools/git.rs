//! Git tool implementations for the coding agent.
//!
//! Four git-aware tools that follow the quill-rs [`Tool`] trait pattern:
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`GitStatus`] | `git_status` | Show working tree status |
//! | [`GitDiff`] | `git_diff` | Show unstaged or staged changes |
//! | [`GitLog`] | `git_log` | Show commit history |
//! | [`GitCommit`] | `git_commit` | Stage files and create a commit |
//!
//! All commands run in the session's working directory. Destructive git
//! operations (force push, hard reset) are not exposed here; they go
//! through the `bash` tool's permission gate instead.

use quill_rs::json_schema_for;
use quill_rs::tools::{Tool, ToolContext, ToolDef, ToolFuture, ToolOutcome, parse_tool_args};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

// ── Helper ──────────────────────────────────────────────────────────

/// Run a git command in the given directory and return its outcome.
async fn run_git(workdir: &Path, args: &[&str]) -> ToolOutcome {
    debug!("git {}", args.join(" "));
    let result = Command::new("git")
        .args(args)
        .current_dir(workdir)
        .output()
        .await;

    match result {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if output.status.success() {
                if stderr.is_empty() {
                    ToolOutcome::ok(stdout)
                } else {
                    ToolOutcome::ok(format!("{stdout}\n[stderr]\n{stderr}"))
                }
            } else {
                ToolOutcome::err(format!(
                    "git failed ({}):\n{stdout}\n{stderr}",
                    output.status
                ))
            }
        }
        Err(e) => ToolOutcome::err(format!("failed to run git: {e}")),
    }
}

// ── GitStatus ───────────────────────────────────────────────────────

/// Arguments for `git_status`.
#[derive(Deserialize, JsonSchema)]
pub struct GitStatusArgs {
    /// Show short-format output.
    #[serde(default)]
    pub short: Option<bool>,
}

/// Show the working tree status (`git status`).
pub struct GitStatus;

impl Tool for GitStatus {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            super::GIT_STATUS,
            "Show which files are modified, staged, or untracked. Use \
             git_diff to see the content of changes.",
            json_schema_for::<GitStatusArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: GitStatusArgs =
                serde_json::from_str(arguments).unwrap_or(GitStatusArgs { short: None });

            let mut cmd_args = vec!["status"];
            if args.short.unwrap_or(false) {
                cmd_args.push("--short");
            }
            run_git(&ctx.workdir, &cmd_args).await
        })
    }
}

// ── GitDiff ─────────────────────────────────────────────────────────

/// Arguments for `git_diff`.
#[derive(Deserialize, JsonSchema)]
pub struct GitDiffArgs {
    /// Show staged changes instead of unstaged.
    #[serde(default)]
    pub staged: Option<bool>,
    /// Limit the diff to a specific file or directory path.
    #[serde(default)]
    pub path: Option<String>,
}

/// Show changes between commits, index, and working tree (`git diff`).
pub struct GitDiff;

impl Tool for GitDiff {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            super::GIT_DIFF,
            "Show file changes: unstaged by default, staged with \
             staged=true. Optionally limit to one path.",
            json_schema_for::<GitDiffArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: GitDiffArgs = serde_json::from_str(arguments).unwrap_or(GitDiffArgs {
                staged: None,
                path: None,
            });

            let mut cmd_args = vec!["diff"];
            if args.staged.unwrap_or(false) {
                cmd_args.push("--staged");
            }

            let path_string;
            if let Some(ref p) = args.path {
                if p.contains("..") {
                    return ToolOutcome::err("path traversal not allowed");
                }
                cmd_args.push("--");
                path_string = p.clone();
                cmd_args.push(&path_string);
            }

            run_git(&ctx.workdir, &cmd_args).await
        })
    }
}

// ── GitLog ──────────────────────────────────────────────────────────

/// Arguments for `git_log`.
#[derive(Deserialize, JsonSchema)]
pub struct GitLogArgs {
    /// Number of commits to show. Default: 10, max: 100.
    #[serde(default)]
    pub count: Option<u32>,
    /// Use one-line format.
    #[serde(default)]
    pub oneline: Option<bool>,
}

/// Show commit history (`git log`).
pub struct GitLog;

impl Tool for GitLog {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            super::GIT_LOG,
            "Show recent commit history. Use count to limit and \
             oneline=true for compact output.",
            json_schema_for::<GitLogArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: GitLogArgs = serde_json::from_str(arguments).unwrap_or(GitLogArgs {
                count: None,
                oneline: None,
            });

            let count = args.count.unwrap_or(10).min(100);
            let count_str = format!("-{count}");

            let mut cmd_args = vec!["log", &count_str];
            if args.oneline.unwrap_or(false) {
                cmd_args.push("--oneline");
            }
            run_git(&ctx.workdir, &cmd_args).await
        })
    }
}

// ── GitCommit ───────────────────────────────────────────────────────

/// Arguments for `git_commit`.
#[derive(Deserialize, JsonSchema)]
pub struct GitCommitArgs {
    /// Commit message.
    pub message: String,
    /// Files to stage before committing. If empty, commits whatever is
    /// already staged.
    #[serde(default)]
    pub paths: Option<Vec<String>>,
}

/// Stage files and create a commit (`git add` + `git commit`).
pub struct GitCommit;

impl Tool for GitCommit {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            super::GIT_COMMIT,
            "Stage the given paths and create a git commit. Only commit \
             when the user has asked for one.",
            json_schema_for::<GitCommitArgs>(),
        )
    }

    fn execute<'a>(&'a self, arguments: &'a str, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: GitCommitArgs = match parse_tool_args(arguments) {
                Ok(a) => a,
                Err(e) => return ToolOutcome::err(e),
            };

            if args.message.is_empty() {
                return ToolOutcome::err("commit message must not be empty");
            }

            if let Some(ref paths) = args.paths {
                for p in paths {
                    if p.contains("..") {
                        return ToolOutcome::err("path traversal not allowed");
                    }
                }
            }

            if let Some(ref paths) = args.paths
                && !paths.is_empty()
            {
                let mut add_args = vec!["add"];
                add_args.extend(paths.iter().map(|s| s.as_str()));
                let staged = run_git(&ctx.workdir, &add_args).await;
                if staged.is_error {
                    return ToolOutcome::err(format!("staging files: {}", staged.output));
                }
            }

            run_git(&ctx.workdir, &["commit", "-m", &args.message]).await
        })
    }
}
