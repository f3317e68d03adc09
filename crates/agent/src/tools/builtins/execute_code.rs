//! `execute_code` builtin: runs a source snippet inside the remote sandbox's
//! interpreter (as opposed to `execute_bash`'s shell).

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::check_writable;
use crate::tools::ToolContext;

pub struct ExecuteCodeTool;

impl Default for ExecuteCodeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecuteCodeTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Execute a source snippet in the sandbox's interpreter session. \
                    State (variables, imports) persists across calls within the same sandbox."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "source": { "type": "string", "description": "Source code to execute." }
                    },
                    "required": ["source"]
                }),
            },
        }
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        check_writable(context)?;

        let source = args
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("source is required".to_string()))?;

        let result = context
            .sandbox()
            .execute_code(source)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?;

        let output = json!({
            "ok": result.ok,
            "stdout": result.stdout,
            "stderr": result.stderr,
            "created_files": result.created_files,
        });

        serde_json::to_string(&output).map_err(|e| ToolError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use std::sync::Arc;
    use vessel_sandbox::FakeSandbox;

    #[tokio::test]
    async fn executes_and_reports_stdout() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::basic("test", sandbox);

        let result = ExecuteCodeTool::new()
            .call(json!({ "source": "print(1+1)" }), &context)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["ok"], true);
    }

    #[tokio::test]
    async fn rejects_in_read_only_context() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::basic("test", sandbox).with_read_only(true);

        let err = ExecuteCodeTool::new()
            .call(json!({ "source": "1" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
