//! `write_file` builtin: writes a file through the session's remote sandbox.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::{check_path_allowed, check_writable};
use crate::tools::ToolContext;

pub struct WriteFileTool;

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Write content to a file in the sandbox workspace, creating it if \
                    it does not exist."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File path to write." },
                        "content": { "type": "string", "description": "Content to write." }
                    },
                    "required": ["path", "content"]
                }),
            },
        }
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        check_writable(context)?;

        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("content is required".to_string()))?;

        check_path_allowed(context, path)?;

        let ok = context
            .sandbox()
            .write_file(path, content)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?;

        if !ok {
            return Err(ToolError::Sandbox(format!("write rejected for {path}")));
        }

        let result = json!({ "path": path, "bytes": content.len() });
        serde_json::to_string(&result).map_err(|e| ToolError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use std::sync::Arc;
    use vessel_sandbox::FakeSandbox;

    #[tokio::test]
    async fn writes_and_reports_byte_count() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::basic("test", sandbox.clone());
        let tool = WriteFileTool::new();

        let result = tool
            .call(json!({ "path": "out.txt", "content": "hello" }), &context)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["bytes"], 5);
        assert_eq!(
            sandbox.read_file("out.txt").await.unwrap(),
            Some("hello".to_string())
        );
    }

    #[tokio::test]
    async fn rejects_writes_in_read_only_context() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::basic("test", sandbox).with_read_only(true);
        let tool = WriteFileTool::new();

        let err = tool
            .call(json!({ "path": "out.txt", "content": "x" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
