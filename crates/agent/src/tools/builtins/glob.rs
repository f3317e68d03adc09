//! `glob` builtin: fast file pattern matching via the remote sandbox.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::check_path_allowed;
use crate::tools::ToolContext;

pub struct GlobTool;

impl Default for GlobTool {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Fast file pattern matching (e.g. \"**/*.rs\"). Returns matching \
                    paths ordered by modified time, most recent first."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "description": "Glob pattern to match files against."
                        },
                        "path": {
                            "type": "string",
                            "description": "Directory to search in. Defaults to the session working directory."
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results to return.",
                            "default": 100,
                            "minimum": 1
                        }
                    },
                    "required": ["pattern"]
                }),
            },
        }
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let pattern = args
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("pattern is required".to_string()))?;

        let root = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;

        check_path_allowed(context, root)?;

        let mut matches = context
            .sandbox()
            .glob(pattern, root)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?;

        let was_truncated = matches.len() > limit;
        matches.truncate(limit);

        let result = json!({
            "matches": matches,
            "count": matches.len(),
            "truncated": was_truncated,
        });

        let mut output = serde_json::to_string_pretty(&result).map_err(|e| ToolError::Other(e.into()))?;
        if was_truncated {
            output.push_str(&format!(
                "\n\n[Results limited to {limit}. Refine your pattern to see more specific matches.]"
            ));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use std::sync::Arc;
    use vessel_sandbox::FakeSandbox;

    #[tokio::test]
    async fn matches_only_the_requested_extension() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("test.rs", "x");
        sandbox.seed_file("test.txt", "x");
        sandbox.seed_file("src/main.rs", "x");
        let context = AgentToolContext::basic("test", sandbox);

        let result = GlobTool::new().call(json!({ "pattern": "*.rs" }), &context).await.unwrap();
        assert!(result.contains("test.rs"));
        assert!(!result.contains("test.txt"));
    }

    #[tokio::test]
    async fn truncates_to_the_requested_limit() {
        let sandbox = Arc::new(FakeSandbox::new());
        for i in 0..10 {
            sandbox.seed_file(&format!("test{i}.rs"), "x");
        }
        let context = AgentToolContext::basic("test", sandbox);

        let result = GlobTool::new()
            .call(json!({ "pattern": "*.rs", "limit": 5 }), &context)
            .await
            .unwrap();
        assert!(result.contains("\"count\": 5"));
        assert!(result.contains("\"truncated\": true"));
    }
}
