//! Terminal approval prompts.
//!
//! [`TerminalPrompter`] implements the quill-rs
//! [`Prompter`](quill_rs::permission::Prompter) against stdin/stderr. The
//! prompt is synchronous: the session blocks until the user answers.

use quill_rs::permission::{Answer, Prompter};
use std::io::{BufRead, Write};

/// Prompter that asks for approval on the terminal.
///
/// Prints the action and its details to stderr (so piped stdout stays
/// clean), then reads one line: `y` approves once, `a` approves for the
/// rest of the session, anything else denies.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn parse(line: &str) -> Answer {
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Answer::Once,
            "a" | "always" => Answer::Always,
            _ => Answer::Deny,
        }
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&self, action: &str, details: &str) -> Answer {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "\nApproval required: {action}");
        for line in details.lines() {
            let _ = writeln!(err, "  {line}");
        }
        let _ = write!(err, "Allow? [y]es once / [a]lways / [N]o: ");
        let _ = err.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => Self::parse(&line),
            Err(_) => Answer::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_yes_variants() {
        assert_eq!(TerminalPrompter::parse("y\n"), Answer::Once);
        assert_eq!(TerminalPrompter::parse("YES"), Answer::Once);
        assert_eq!(TerminalPrompter::parse("  a  "), Answer::Always);
        assert_eq!(TerminalPrompter::parse("always"), Answer::Always);
    }

    #[test]
    fn parse_denies_everything_else() {
        assert_eq!(TerminalPrompter::parse(""), Answer::Deny);
        assert_eq!(TerminalPrompter::parse("n"), Answer::Deny);
        assert_eq!(TerminalPrompter::parse("maybe"), Answer::Deny);
    }
}
