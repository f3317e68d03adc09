//! Fault detector & recovery (C7) — `spec.md` §4.6.

use std::time::Duration;

use vessel_agent::{AgentIdentity, CliConfig, SandboxRequest, SessionManager};
use vessel_sandbox::RemoteSandbox;

/// Substrings that mark an error message or text result as a sandbox fault,
/// matched case-insensitively.
const FAULT_SUBSTRINGS: [&str; 6] = [
    "sandbox",
    "disconnect",
    "connection refused",
    "no route",
    "timed out",
    "eof",
];

/// Consecutive empty results from a sensitive tool before a liveness probe
/// is attempted (`SPEC_FULL.md` §4.4 ADDED, resolving the Open Question in
/// `spec.md` §9).
pub const EMPTY_RESULT_THRESHOLD: u32 = 3;

/// Tools whose empty/near-empty results count toward the empty-result
/// streak (`spec.md` §4.5 Phase 2).
const SENSITIVE_TOOLS: [&str; 4] = ["read_file", "glob", "grep", "execute_bash"];

pub fn is_sensitive_tool(name: &str) -> bool {
    SENSITIVE_TOOLS.contains(&name)
}

/// Whether `text` contains a fault substring, case-insensitively.
pub fn is_fault_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    FAULT_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSignal {
    None,
    Fault,
}

/// Per-turn fault tracking state. A fresh instance is created for every
/// turn; `retry_used` enforces Invariant 3 (at most one recovery attempt
/// per turn).
#[derive(Debug, Default)]
pub struct FaultDetector {
    pub retry_used: bool,
    empty_streak: u32,
}

impl FaultDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a tool result. `name` is the tool name (e.g. `shell`,
    /// `Bash`, `read_file`); `ok` reflects whether the underlying call
    /// reported success; `content` is the rendered result text.
    pub fn observe_text_result(&mut self, name: &str, ok: bool, content: &str) -> FaultSignal {
        let is_shell = name.eq_ignore_ascii_case("shell") || name.eq_ignore_ascii_case("bash");
        if (is_shell && !ok) || content.trim_start().to_lowercase().starts_with("error") {
            if is_fault_text(content) {
                return FaultSignal::Fault;
            }
        }

        if is_sensitive_tool(name) {
            if content.trim().is_empty() {
                self.empty_streak += 1;
            } else {
                self.empty_streak = 0;
            }
        }

        FaultSignal::None
    }

    pub fn empty_streak_exceeded(&self) -> bool {
        self.empty_streak >= EMPTY_RESULT_THRESHOLD
    }

    pub fn reset_empty_streak(&mut self) {
        self.empty_streak = 0;
    }
}

/// A trivial `list_directory("/")` call: liveness probe backing the
/// empty-streak heuristic.
pub async fn liveness_probe(sandbox: &dyn RemoteSandbox) -> bool {
    sandbox.list_directory("/").await.is_ok()
}

/// One-shot reattach-or-new-sandbox recovery (`spec.md` §4.6 step 2): try
/// re-initializing with the same sandbox id; on failure, discard the
/// persisted record and bring up a fresh sandbox.
pub async fn reattach_or_recreate(
    manager: &SessionManager,
    agent: &AgentIdentity,
    config: &CliConfig,
    sandbox: std::sync::Arc<dyn RemoteSandbox>,
    tool_registry: vessel_agent::ToolRegistry,
) -> Result<vessel_agent::Session, vessel_agent::StoreError> {
    let current_id = sandbox.sandbox_id();
    let request = match current_id {
        Some(id) => SandboxRequest::Explicit(id),
        None => SandboxRequest::Fresh,
    };
    manager
        .acquire(agent, config, sandbox, tool_registry, request)
        .await
}

pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_substrings_are_case_insensitive() {
        assert!(is_fault_text("Error: Connection Refused"));
        assert!(is_fault_text("SANDBOX disconnected"));
        assert!(!is_fault_text("file not found"));
    }

    #[test]
    fn empty_streak_trips_threshold_after_three_sensitive_misses() {
        let mut detector = FaultDetector::new();
        for _ in 0..2 {
            detector.observe_text_result("read_file", true, "");
            assert!(!detector.empty_streak_exceeded());
        }
        detector.observe_text_result("read_file", true, "");
        assert!(detector.empty_streak_exceeded());
    }

    #[test]
    fn non_empty_result_resets_the_streak() {
        let mut detector = FaultDetector::new();
        detector.observe_text_result("glob", true, "");
        detector.observe_text_result("glob", true, "");
        detector.observe_text_result("glob", true, "src/main.rs");
        assert!(!detector.empty_streak_exceeded());
    }

    #[test]
    fn shell_failure_with_fault_substring_signals_fault() {
        let mut detector = FaultDetector::new();
        let signal = detector.observe_text_result("shell", false, "error: connection refused");
        assert_eq!(signal, FaultSignal::Fault);
    }

    #[test]
    fn shell_failure_without_fault_substring_is_a_plain_tool_error() {
        let mut detector = FaultDetector::new();
        let signal = detector.observe_text_result("shell", false, "error: command not found");
        assert_eq!(signal, FaultSignal::None);
    }

    #[tokio::test]
    async fn liveness_probe_succeeds_against_a_healthy_sandbox() {
        let sandbox = vessel_sandbox::FakeSandbox::new();
        assert!(liveness_probe(&sandbox).await);
    }
}
