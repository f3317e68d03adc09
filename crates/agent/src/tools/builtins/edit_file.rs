//! `edit_file` builtin: exact string replacement via the remote sandbox.
//!
//! Fuzzy matching (whitespace-insensitive, block-indent-insensitive) is a
//! backend concern of the sandbox's `edit_file` RPC, not this tool — the
//! tool's job is argument validation and turning the RPC outcome into the
//! model-facing message.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::{check_path_allowed, check_writable};
use crate::tools::ToolContext;

pub struct EditFileTool;

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl EditFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Replace an exact block of text in a file with new text. Fails if \
                    `old` is not found or matches more than once unless replace_all is set."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File to edit." },
                        "old": { "type": "string", "description": "Exact text to find." },
                        "new": { "type": "string", "description": "Replacement text." },
                        "replace_all": {
                            "type": "boolean",
                            "description": "Replace every occurrence instead of requiring a single match.",
                            "default": false
                        }
                    },
                    "required": ["path", "old", "new"]
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
        let old = args
            .get("old")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("old is required".to_string()))?;
        let new = args
            .get("new")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("new is required".to_string()))?;
        let replace_all = args.get("replace_all").and_then(Value::as_bool).unwrap_or(false);

        check_path_allowed(context, path)?;

        let outcome = context
            .sandbox()
            .edit_file(path, old, new, replace_all)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?;

        if !outcome.ok {
            return Err(ToolError::InvalidRequest(
                outcome.error.unwrap_or_else(|| "edit failed".to_string()),
            ));
        }

        Ok(outcome.message.unwrap_or_else(|| "edit applied".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use std::sync::Arc;
    use vessel_sandbox::FakeSandbox;

    #[tokio::test]
    async fn applies_a_single_replacement() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("a.txt", "hello world");
        let context = AgentToolContext::basic("test", sandbox.clone());

        EditFileTool::new()
            .call(json!({ "path": "a.txt", "old": "world", "new": "rust" }), &context)
            .await
            .unwrap();

        assert_eq!(
            sandbox.read_file("a.txt").await.unwrap(),
            Some("hello rust".to_string())
        );
    }

    #[tokio::test]
    async fn surfaces_not_found_as_invalid_request() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("a.txt", "hello world");
        let context = AgentToolContext::basic("test", sandbox);

        let err = EditFileTool::new()
            .call(json!({ "path": "a.txt", "old": "missing", "new": "x" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn rejects_edits_in_read_only_context() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("a.txt", "hello world");
        let context = AgentToolContext::basic("test", sandbox).with_read_only(true);

        let err = EditFileTool::new()
            .call(json!({ "path": "a.txt", "old": "world", "new": "rust" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
