//! System prompt assembly.
//!
//! [`SystemPromptBuilder`] assembles multi-section system prompts with
//! conditional and optional sections instead of manual string
//! concatenation. [`default_system_prompt`] builds the standard coding-agent
//! prompt from the working directory and the registered tools.

use crate::tools::ToolDef;
use std::path::Path;

/// Builder for multi-section system prompts.
///
/// Sections are joined with double newlines and get `## ` headings. Empty
/// sections are silently skipped.
///
/// # Example
///
/// ```
/// use quill_rs::agent::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("You are a coding assistant.")
///     .section("Environment", "Working directory: /repo")
///     .section_if(false, "Skipped", || "never rendered".into())
///     .section_opt("Notes", None::<String>)
///     .build();
///
/// assert!(prompt.contains("## Environment"));
/// assert!(!prompt.contains("Skipped"));
/// ```
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    /// Create a builder with an initial preamble section (no heading).
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a named section. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    /// Conditionally append a section; the content closure only runs when
    /// `condition` holds.
    pub fn section_if(
        self,
        condition: bool,
        heading: &str,
        content_fn: impl FnOnce() -> String,
    ) -> Self {
        if condition {
            self.section(heading, content_fn())
        } else {
            self
        }
    }

    /// Append a section only if the content is `Some`.
    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Join all sections into the final prompt.
    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// Build the default coding-agent system prompt.
///
/// Names the environment (working directory, OS) and summarizes the
/// available tools so the model knows what it can reach for.
pub fn default_system_prompt(workdir: &Path, tools: &[ToolDef]) -> String {
    let tool_list: String = tools
        .iter()
        .map(|t| {
            let summary = t.description.split('.').next().unwrap_or(&t.description);
            format!("- {}: {}", t.name, summary.trim())
        })
        .collect::<Vec<_>>()
        .join("\n");

    SystemPromptBuilder::new(
        "You are a coding assistant operating inside a project checkout. \
         Use the available tools to read, search, and modify files, and to \
         run commands. Prefer small, verifiable steps: read before you \
         edit, and check your work with the tools rather than guessing.",
    )
    .section(
        "Environment",
        format!(
            "Working directory: {}\nOperating system: {}",
            workdir.display(),
            std::env::consts::OS,
        ),
    )
    .section_if(!tools.is_empty(), "Tools", || tool_list)
    .section(
        "Conventions",
        "Paths are relative to the working directory. When a tool returns \
         an error, read it and correct your arguments instead of retrying \
         the same call. Keep answers concise and grounded in what the \
         tools returned.",
    )
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_joins_sections_with_headings() {
        let prompt = SystemPromptBuilder::new("Preamble.")
            .section("First", "one")
            .section("Second", "two")
            .build();
        assert!(prompt.starts_with("Preamble."));
        assert!(prompt.contains("## First\n\none"));
        assert!(prompt.contains("## Second\n\ntwo"));
    }

    #[test]
    fn builder_skips_empty_and_false_sections() {
        let prompt = SystemPromptBuilder::new("P")
            .section("Empty", "")
            .section_if(false, "Off", || "hidden".into())
            .section_opt("Missing", None::<String>)
            .section_opt("Present", Some("here"))
            .build();
        assert!(!prompt.contains("Empty"));
        assert!(!prompt.contains("Off"));
        assert!(!prompt.contains("Missing"));
        assert!(prompt.contains("## Present"));
    }

    #[test]
    fn default_prompt_names_workdir_and_tools() {
        let tools = vec![ToolDef::new(
            "read_file",
            "Read a file from the working directory. Optionally slice.",
            serde_json::json!({"type": "object"}),
        )];
        let prompt = default_system_prompt(Path::new("/repo"), &tools);
        assert!(prompt.contains("Working directory: /repo"));
        assert!(prompt.contains("- read_file: Read a file from the working directory"));
        assert!(prompt.contains("## Conventions"));
    }

    #[test]
    fn default_prompt_omits_tools_section_when_empty() {
        let prompt = default_system_prompt(Path::new("."), &[]);
        assert!(!prompt.contains("## Tools"));
    }
}
