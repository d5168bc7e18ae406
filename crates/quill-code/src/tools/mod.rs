//! Git tools for the coding agent.
//!
//! Provides git-aware tools and the [`GitToolsExt`] trait for easy
//! registration on a [`ToolRegistry`](quill_rs::tools::ToolRegistry).

pub mod git;

pub use git::{GitCommit, GitDiff, GitLog, GitStatus};

// ── Tool name constants ─────────────────────────────────────────────

pub const GIT_STATUS: &str = "git_status";
pub const GIT_DIFF: &str = "git_diff";
pub const GIT_LOG: &str = "git_log";
pub const GIT_COMMIT: &str = "git_commit";

// ── Extension trait ─────────────────────────────────────────────────

/// Extension trait for registering git tools on a
/// [`ToolRegistry`](quill_rs::tools::ToolRegistry).
///
/// # Example
///
/// ```ignore
/// use quill_rs::tools::ToolRegistry;
/// use quill_code::tools::GitToolsExt;
///
/// let tools = ToolRegistry::new()
///     .with_common_tools(&gate)
///     .with_git_tools();
/// ```
pub trait GitToolsExt {
    fn with_git_tools(self) -> Self;
}

impl GitToolsExt for quill_rs::tools::ToolRegistry {
    fn with_git_tools(self) -> Self {
        self.with(GitStatus)
            .with(GitDiff)
            .with(GitLog)
            .with(GitCommit)
    }
}
