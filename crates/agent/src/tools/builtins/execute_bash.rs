//! `execute_bash` builtin: runs a shell command inside the remote sandbox.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::check_writable;
use crate::tools::ToolContext;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Hard cap on `timeout_secs`, regardless of what the model requests
/// (`spec.md` §4.2).
const MAX_TIMEOUT_SECS: u64 = 600;

pub struct ExecuteBashTool;

impl Default for ExecuteBashTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecuteBashTool {
    pub fn new() -> Self {
        Self
    }
}

fn clamp_timeout_secs(requested: u64) -> u64 {
    requested.min(MAX_TIMEOUT_SECS)
}

#[async_trait]
impl Tool for ExecuteBashTool {
    fn name(&self) -> &str {
        "execute_bash"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Run a bash command inside the sandbox and return stdout, stderr, \
                    and exit code."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "Command to run." },
                        "cwd": { "type": "string", "description": "Working directory, relative to the sandbox home." },
                        "timeout_secs": {
                            "type": "integer",
                            "description": "Timeout in seconds before the command is killed.",
                            "default": DEFAULT_TIMEOUT_SECS,
                            "minimum": 1
                        },
                        "background": {
                            "type": "boolean",
                            "description": "Run the command detached and return immediately.",
                            "default": false
                        }
                    },
                    "required": ["command"]
                }),
            },
        }
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        check_writable(context)?;

        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("command is required".to_string()))?;
        let cwd = args.get("cwd").and_then(Value::as_str);
        let requested_timeout =
            args.get("timeout_secs").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_SECS);
        let timeout = Duration::from_secs(clamp_timeout_secs(requested_timeout));
        let background = args.get("background").and_then(Value::as_bool).unwrap_or(false);

        let result = context
            .sandbox()
            .execute_bash(command, cwd, timeout, background)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?;

        if result.exit_code != 0 {
            return Ok(truncate_for_model(&format!(
                "ERROR: Command failed (exit code {})\n{}",
                result.exit_code, result.stderr
            )));
        }

        let output = json!({
            "exit_code": result.exit_code,
            "stdout": result.stdout,
            "stderr": result.stderr,
        });

        serde_json::to_string(&output).map_err(|e| ToolError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use std::sync::Arc;
    use vessel_sandbox::{BashResult, FakeSandbox};

    #[tokio::test]
    async fn returns_stdout_and_exit_code() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_bash(
            "echo hello",
            BashResult { ok: true, stdout: "hello\n".to_string(), stderr: String::new(), exit_code: 0 },
        );
        let context = AgentToolContext::basic("test", sandbox);

        let result = ExecuteBashTool::new()
            .call(json!({ "command": "echo hello" }), &context)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["exit_code"], 0);
        assert_eq!(parsed["stdout"], "hello\n");
    }

    #[tokio::test]
    async fn nonzero_exit_renders_as_an_error_string() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_bash(
            "false",
            BashResult {
                ok: true,
                stdout: String::new(),
                stderr: "boom\n".to_string(),
                exit_code: 1,
            },
        );
        let context = AgentToolContext::basic("test", sandbox);

        let result = ExecuteBashTool::new()
            .call(json!({ "command": "false" }), &context)
            .await
            .unwrap();
        assert_eq!(result, "ERROR: Command failed (exit code 1)\nboom\n");
    }

    #[test]
    fn timeout_is_clamped_to_ten_minutes() {
        assert_eq!(clamp_timeout_secs(99_999), 600);
        assert_eq!(clamp_timeout_secs(30), 30);
        assert_eq!(clamp_timeout_secs(600), 600);
    }

    #[tokio::test]
    async fn rejects_in_read_only_context() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::basic("test", sandbox).with_read_only(true);

        let err = ExecuteBashTool::new()
            .call(json!({ "command": "echo hi" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
