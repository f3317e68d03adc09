//! Tool context and error types for the unified tool interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::{Path, PathBuf};

/// Capability requirements that tools may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CapabilityRequirement {
    /// Requires a working directory to resolve relative paths against.
    Filesystem,
}

/// Unified error type for all tools. Maps onto the error-kind taxonomy:
/// `SandboxFault` surfaces here as `Sandbox`; `AccessDenied` is the
/// allowed-directory validation failure (`spec.md` §4.2), distinct from the
/// plan-mode read-only guard (`PermissionDenied`); `ConfigInvalid` is out of
/// scope for a running tool call.
///
/// Every variant's `Display` is the bare message with no prefix: the uniform
/// `ERROR: {err}` adapter (`spec.md` §4.2, C2) is what puts `ERROR:` in front
/// of it, so this type must not add its own.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Sandbox(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("{0}")]
    SessionError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<vessel_sandbox::SandboxError> for ToolError {
    fn from(err: vessel_sandbox::SandboxError) -> Self {
        ToolError::Sandbox(err.to_string())
    }
}

/// The JSON-schema tool definition handed to the model runtime, mirroring
/// the conventional `{type: "function", function: {...}}` tool-call shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Core context trait every tool call receives.
#[async_trait]
pub trait ToolContext: Send + Sync {
    /// The current session id.
    fn session_id(&self) -> &str;

    /// The current working directory, if set.
    fn cwd(&self) -> Option<&Path>;

    /// Resolve a path against `cwd`. Errors if `path` is relative and no
    /// working directory is set.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            self.cwd().map(|cwd| cwd.join(path)).ok_or_else(|| {
                ToolError::InvalidRequest(
                    "cannot resolve relative path: no working directory set".into(),
                )
            })
        }
    }

    /// The remote sandbox backing file and execution tools.
    fn sandbox(&self) -> &dyn vessel_sandbox::RemoteSandbox;

    /// Record progress for long-running operations (e.g. background bash).
    async fn record_progress(
        &self,
        kind: &str,
        content: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<String, ToolError>;

    /// Access to tool-specific context extensions.
    fn as_any(&self) -> &dyn Any;

    /// Ask the user a structured question and wait for a response (HITL).
    /// Falls back to stdin/stdout when no richer question channel exists.
    async fn ask_question(
        &self,
        _question_id: &str,
        question: &str,
        header: &str,
        options: &[(String, String)],
        multiple: bool,
    ) -> Result<Vec<String>, ToolError> {
        use std::io::{self, Write};

        println!("\n{}", "=".repeat(60));
        println!("{header}");
        println!("{}", "=".repeat(60));
        println!("{question}\n");

        for (idx, (label, description)) in options.iter().enumerate() {
            println!("{}. {} - {}", idx + 1, label, description);
        }

        if multiple {
            println!(
                "\nEnter your choices (comma-separated numbers, or 'other' for custom input): "
            );
        } else {
            println!("\nEnter your choice (number, or 'other' for custom input): ");
        }

        print!("> ");
        io::stdout().flush().map_err(|e| ToolError::Other(e.into()))?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| ToolError::Other(e.into()))?;
        let input = input.trim();

        if input.eq_ignore_ascii_case("other") {
            println!("Enter your custom response: ");
            print!("> ");
            io::stdout().flush().map_err(|e| ToolError::Other(e.into()))?;

            let mut custom = String::new();
            io::stdin()
                .read_line(&mut custom)
                .map_err(|e| ToolError::Other(e.into()))?;
            return Ok(vec![custom.trim().to_string()]);
        }

        let selections: Vec<usize> = input
            .split(',')
            .filter_map(|s| s.trim().parse::<usize>().ok())
            .collect();

        let mut answers = Vec::new();
        for sel in selections {
            if sel > 0 && sel <= options.len() {
                answers.push(options[sel - 1].0.clone());
            }
        }

        if answers.is_empty() {
            Err(ToolError::InvalidRequest("no valid selections made".to_string()))
        } else {
            Ok(answers)
        }
    }
}

/// Unified tool trait implemented by every builtin.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    /// Capabilities this tool requires. Default: empty.
    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(
        &self,
        args: serde_json::Value,
        context: &dyn ToolContext,
    ) -> Result<String, ToolError>;

    async fn initialize(&mut self, _context: &dyn ToolContext) -> Result<(), ToolError> {
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Truncate an error/tool-result message to 4000 bytes, the uniform error
/// adapter's truncation limit (spec C2), leaving a recovery hint.
pub fn truncate_for_model(message: &str) -> String {
    const LIMIT: usize = 4000;
    if message.len() <= LIMIT {
        return message.to_string();
    }
    let mut end = LIMIT;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n... (truncated, {} bytes total; narrow your request and retry)",
        &message[..end],
        message.len()
    )
}
