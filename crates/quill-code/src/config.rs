//! Coding-agent configuration with sensible defaults.
//!
//! [`CodeConfig`] captures the settings the coding agent needs and converts
//! them into quill-rs types via [`build_session_config`](CodeConfig::build_session_config)
//! and [`build_tool_registry`](CodeConfig::build_tool_registry).

use std::path::PathBuf;
use std::sync::Arc;

use quill_rs::agent::SessionConfig;
use quill_rs::permission::PermissionGate;
use quill_rs::tools::ToolRegistry;

use crate::tools::GitToolsExt;

/// Configuration for a coding session.
#[derive(Debug, Clone)]
pub struct CodeConfig {
    /// Model identifier. Default: `"anthropic/claude-sonnet-4"`.
    pub model: String,
    /// Working directory for file and git tools. Default: `"."`.
    pub workdir: PathBuf,
    /// Maximum model calls per user turn. Default: `20`.
    pub max_steps: u32,
    /// Register the git tools alongside the common tools. Default: `true`.
    pub git_tools: bool,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4".to_string(),
            workdir: PathBuf::from("."),
            max_steps: 20,
            git_tools: true,
        }
    }
}

impl CodeConfig {
    /// Build a [`SessionConfig`] from this coding config.
    pub fn build_session_config(&self) -> SessionConfig {
        SessionConfig::new(self.model.clone())
            .with_workdir(self.workdir.clone())
            .with_max_steps(self.max_steps)
    }

    /// Build a [`ToolRegistry`] with the common file/shell tools and,
    /// when enabled, the git tools. Mutating tools share `gate`.
    pub fn build_tool_registry(&self, gate: &Arc<PermissionGate>) -> ToolRegistry {
        let registry = ToolRegistry::new().with_common_tools(gate);
        if self.git_tools {
            registry.with_git_tools()
        } else {
            registry
        }
    }
}
