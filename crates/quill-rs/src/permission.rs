//! Dangerous-action classification and interactive approval.
//!
//! [`is_dangerous`] classifies shell commands against a fixed pattern list.
//! [`PermissionGate`] blocks a proposed action until the user answers a
//! synchronous prompt, remembering "always" approvals for the lifetime of
//! the gate. The gate is session-scoped state, not a global: two sessions
//! in one process never share approvals.

use regex::RegexSet;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

/// Patterns that mark a shell command as dangerous.
///
/// Case-insensitive, matched against the trimmed command. Covers
/// recursive/force deletes, superuser elevation, permission and ownership
/// changes, forced git history rewrites, raw device writes, filesystem
/// formatting, process kills, and system shutdown.
const DANGEROUS_PATTERNS: &[&str] = &[
    r"(?i)\brm\s+(-[a-z]*\s+)*-[a-z]*[rf]",
    r"(?i)\bsudo\b",
    r"(?i)\bchmod\b",
    r"(?i)\bchown\b",
    r"(?i)\bgit\s+push\s+.*(--force|-f\b)",
    r"(?i)\bgit\s+reset\s+--hard",
    r"(?i)\bgit\s+clean\b",
    r"(?i)\bdd\s+.*\bof=/dev/",
    r"(?i)\bmkfs",
    r"(?i)\b(kill|pkill|killall)\b",
    r"(?i)\b(shutdown|reboot|halt|poweroff)\b",
];

fn dangerous_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(DANGEROUS_PATTERNS).expect("dangerous-command patterns must compile")
    })
}

/// Whether a shell command matches the dangerous-command pattern list.
pub fn is_dangerous(command: &str) -> bool {
    dangerous_set().is_match(command.trim())
}

/// The user's answer to an approval prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Answer {
    /// Approve this one request; do not remember.
    Once,
    /// Approve and remember for the rest of the session.
    Always,
    /// Deny. Anything other than an explicit yes means deny.
    Deny,
}

/// Presents an approval question to the user and blocks for the answer.
///
/// The prompt is synchronous by design: no other conversation activity
/// proceeds while a question is outstanding. Front-ends implement this
/// against their input mechanism; tests script it.
pub trait Prompter: Send + Sync {
    fn ask(&self, action: &str, details: &str) -> Answer;
}

/// A prompter that denies everything. Useful as a safe default in
/// non-interactive contexts.
pub struct AlwaysDeny;

impl Prompter for AlwaysDeny {
    fn ask(&self, _action: &str, _details: &str) -> Answer {
        Answer::Deny
    }
}

/// Gate for dangerous actions with session-lifetime approval memory.
pub struct PermissionGate {
    prompter: Box<dyn Prompter>,
    approved: Mutex<HashSet<(String, String)>>,
}

impl PermissionGate {
    pub fn new(prompter: impl Prompter + 'static) -> Self {
        Self {
            prompter: Box::new(prompter),
            approved: Mutex::new(HashSet::new()),
        }
    }

    /// Ask whether `(action, details)` may proceed.
    ///
    /// Returns true immediately, without prompting, if the pair was
    /// previously approved with [`Answer::Always`]. Otherwise blocks on the
    /// prompter; only an explicit yes approves.
    pub fn request_approval(&self, action: &str, details: &str) -> bool {
        let key = (action.to_string(), details.to_string());
        {
            let approved = self.approved.lock().unwrap_or_else(|e| e.into_inner());
            if approved.contains(&key) {
                debug!("Approval for '{action}' served from session memory");
                return true;
            }
        }

        match self.prompter.ask(action, details) {
            Answer::Once => {
                info!("User approved '{action}' (once)");
                true
            }
            Answer::Always => {
                info!("User approved '{action}' (always)");
                let mut approved = self.approved.lock().unwrap_or_else(|e| e.into_inner());
                approved.insert(key);
                true
            }
            Answer::Deny => {
                info!("User denied '{action}'");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Scripted prompter that replays a fixed sequence of answers and
    /// records every question it was asked.
    struct Scripted {
        answers: StdMutex<Vec<Answer>>,
        asked: StdMutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(answers: Vec<Answer>) -> Self {
            Self {
                answers: StdMutex::new(answers),
                asked: StdMutex::new(Vec::new()),
            }
        }
    }

    impl Prompter for Scripted {
        fn ask(&self, action: &str, details: &str) -> Answer {
            self.asked
                .lock()
                .unwrap()
                .push((action.to_string(), details.to_string()));
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                Answer::Deny
            } else {
                answers.remove(0)
            }
        }
    }

    #[test]
    fn dangerous_command_coverage() {
        assert!(is_dangerous("rm -rf /tmp/x"));
        assert!(is_dangerous("sudo reboot"));
        assert!(is_dangerous("git push --force"));
        assert!(!is_dangerous("ls -la"));
        assert!(!is_dangerous("echo hello"));
    }

    #[test]
    fn dangerous_matching_is_case_insensitive_and_trimmed() {
        assert!(is_dangerous("  SUDO apt install foo  "));
        assert!(is_dangerous("RM -RF build/"));
        assert!(is_dangerous("Git Push origin main -f"));
    }

    #[test]
    fn more_dangerous_commands() {
        assert!(is_dangerous("rm -fr ./cache"));
        assert!(is_dangerous("chmod 777 /etc/passwd"));
        assert!(is_dangerous("chown root:root file"));
        assert!(is_dangerous("git reset --hard HEAD~3"));
        assert!(is_dangerous("git clean -fd"));
        assert!(is_dangerous("dd if=image.iso of=/dev/sda"));
        assert!(is_dangerous("mkfs.ext4 /dev/sdb1"));
        assert!(is_dangerous("kill -9 1234"));
        assert!(is_dangerous("pkill node"));
        assert!(is_dangerous("shutdown -h now"));
    }

    #[test]
    fn benign_commands_pass() {
        assert!(!is_dangerous("cargo build --release"));
        assert!(!is_dangerous("git push origin main"));
        assert!(!is_dangerous("git status"));
        assert!(!is_dangerous("rm"));
        assert!(!is_dangerous("grep -rn pattern src/"));
        assert!(!is_dangerous("mkdir -p target/tmp"));
    }

    #[test]
    fn once_approves_without_remembering() {
        let gate = PermissionGate::new(Scripted::new(vec![Answer::Once, Answer::Deny]));
        assert!(gate.request_approval("bash", "rm -rf /tmp/x"));
        // Same request prompts again and is now denied.
        assert!(!gate.request_approval("bash", "rm -rf /tmp/x"));
    }

    #[test]
    fn always_is_remembered_per_details() {
        let prompter = Scripted::new(vec![Answer::Always, Answer::Deny]);
        let gate = PermissionGate::new(prompter);

        assert!(gate.request_approval("bash", "git push --force"));
        // Same (action, details): no prompt, approved from memory.
        assert!(gate.request_approval("bash", "git push --force"));
        // Different details for the same action still prompts (and denies).
        assert!(!gate.request_approval("bash", "sudo reboot"));
    }

    #[test]
    fn deny_by_default() {
        let gate = PermissionGate::new(Scripted::new(vec![]));
        assert!(!gate.request_approval("edit", "some diff"));
    }

    #[test]
    fn gates_are_session_scoped() {
        let gate_a = PermissionGate::new(Scripted::new(vec![Answer::Always]));
        let gate_b = PermissionGate::new(Scripted::new(vec![Answer::Deny]));

        assert!(gate_a.request_approval("bash", "kill -9 42"));
        // The other gate has its own approval memory.
        assert!(!gate_b.request_approval("bash", "kill -9 42"));
    }
}
