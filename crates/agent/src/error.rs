//! The error-kind taxonomy from `spec.md` §7, as a single sum type.
//!
//! Recovery decisions key off the variant, not string matching, except at
//! the fault-detector boundary (owned by the `cli` crate) where opaque
//! provider/sandbox error text is still classified by substring match —
//! unavoidable until the remote sandbox exposes structured error codes.

use thiserror::Error;

/// Top-level error type surfaced by the agent crate's session/tool layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transient sandbox disconnect/unreachability. Recovered locally by
    /// the fault detector once per turn; a second occurrence aborts the turn.
    #[error("sandbox fault: {0}")]
    SandboxFault(String),

    /// Tool-level failure (bad arguments, permission denied, missing file).
    /// Surfaced as a structured `ERROR:` string in the tool result so the
    /// model may recover programmatically; never fatal to the turn.
    #[error("tool invocation error: {0}")]
    ToolInvocationError(String),

    /// Path resolved outside the allowed-directory set.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Malformed persisted-session record or bad JSON/TOML. Recovered by
    /// deleting the offending record; never fatal.
    #[error("invalid config/state: {0}")]
    ConfigInvalid(String),

    /// Non-sandbox exception from the model runtime. Re-raised to the
    /// caller, which prints it and returns to the prompt.
    #[error("model stream error: {0}")]
    ModelStreamError(String),

    /// Cooperative cancellation. Never fatal; clears state and returns.
    #[error("cancelled by user")]
    UserCancelled,
}

impl From<vessel_sandbox::SandboxError> for AgentError {
    fn from(err: vessel_sandbox::SandboxError) -> Self {
        match err {
            vessel_sandbox::SandboxError::Unavailable(m) => AgentError::SandboxFault(m),
            vessel_sandbox::SandboxError::Fault(m) => AgentError::SandboxFault(m),
            vessel_sandbox::SandboxError::Timeout(d) => {
                AgentError::SandboxFault(format!("timed out after {d:?}"))
            }
            vessel_sandbox::SandboxError::Transport(m) => AgentError::SandboxFault(m),
        }
    }
}
