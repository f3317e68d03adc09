//! `grep` builtin: regex search over the sandbox workspace.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::check_path_allowed;
use crate::tools::ToolContext;
use vessel_sandbox::{GrepMode, GrepOptions};

pub struct GrepTool;

impl Default for GrepTool {
    fn default() -> Self {
        Self::new()
    }
}

impl GrepTool {
    pub fn new() -> Self {
        Self
    }
}

fn parse_mode(value: Option<&str>) -> Result<GrepMode, ToolError> {
    match value {
        None | Some("files_with_matches") => Ok(GrepMode::FilesWithMatches),
        Some("content") => Ok(GrepMode::Content),
        Some("count") => Ok(GrepMode::Count),
        Some(other) => Err(ToolError::InvalidRequest(format!("unknown grep mode: {other}"))),
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Search file contents with a regular expression. `mode` selects \
                    whether to return matching file paths, matching lines, or per-file counts."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pattern": { "type": "string", "description": "Regular expression to search for." },
                        "path": { "type": "string", "description": "Directory to search in. Defaults to the session working directory." },
                        "mode": {
                            "type": "string",
                            "enum": ["files_with_matches", "content", "count"],
                            "default": "files_with_matches"
                        },
                        "glob": { "type": "string", "description": "Restrict the search to files matching this glob." },
                        "type": { "type": "string", "description": "Restrict the search to files of this type (e.g. \"rust\", \"py\")." },
                        "case_insensitive": { "type": "boolean", "default": false },
                        "line_numbers": {
                            "type": "boolean",
                            "description": "Include line numbers in content-mode results.",
                            "default": false
                        },
                        "lines_after": { "type": "integer", "description": "Lines of trailing context per match.", "minimum": 0 },
                        "lines_before": { "type": "integer", "description": "Lines of leading context per match.", "minimum": 0 },
                        "lines_context": { "type": "integer", "description": "Lines of context on both sides per match.", "minimum": 0 },
                        "multiline": {
                            "type": "boolean",
                            "description": "Allow the pattern to match across line breaks.",
                            "default": false
                        },
                        "head_limit": { "type": "integer", "minimum": 1 },
                        "offset": { "type": "integer", "description": "Skip this many leading matches before returning results.", "minimum": 0 }
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
        let mode = parse_mode(args.get("mode").and_then(Value::as_str))?;

        check_path_allowed(context, root)?;

        let options = GrepOptions {
            mode: Some(mode),
            glob: args.get("glob").and_then(Value::as_str).map(str::to_string),
            file_type: args.get("type").and_then(Value::as_str).map(str::to_string),
            case_insensitive: args.get("case_insensitive").and_then(Value::as_bool).unwrap_or(false),
            line_numbers: args.get("line_numbers").and_then(Value::as_bool).unwrap_or(false),
            lines_after: args.get("lines_after").and_then(Value::as_u64).map(|v| v as usize),
            lines_before: args.get("lines_before").and_then(Value::as_u64).map(|v| v as usize),
            lines_context: args.get("lines_context").and_then(Value::as_u64).map(|v| v as usize),
            multiline: args.get("multiline").and_then(Value::as_bool).unwrap_or(false),
            head_limit: args.get("head_limit").and_then(Value::as_u64).map(|v| v as usize),
            offset: args.get("offset").and_then(Value::as_u64).map(|v| v as usize),
        };

        let matches = context
            .sandbox()
            .grep(pattern, root, &options)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?;

        if matches.is_empty() {
            return Ok("no matches".to_string());
        }

        let rendered = match mode {
            GrepMode::FilesWithMatches => matches.into_iter().map(|m| m.path).collect::<Vec<_>>().join("\n"),
            GrepMode::Count => matches
                .into_iter()
                .map(|m| format!("{}: {}", m.path, m.text))
                .collect::<Vec<_>>()
                .join("\n"),
            GrepMode::Content => matches
                .into_iter()
                .map(|m| match m.line {
                    Some(line) => format!("{}:{}:{}", m.path, line, m.text),
                    None => format!("{}:{}", m.path, m.text),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };

        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use std::sync::Arc;
    use vessel_sandbox::FakeSandbox;

    #[tokio::test]
    async fn files_with_matches_mode_lists_paths() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("a.txt", "needle here");
        sandbox.seed_file("b.txt", "nothing");
        let context = AgentToolContext::basic("test", sandbox);

        let result = GrepTool::new().call(json!({ "pattern": "needle" }), &context).await.unwrap();
        assert_eq!(result, "a.txt");
    }

    #[tokio::test]
    async fn content_mode_reports_line_numbers() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("a.txt", "one\nneedle\nthree");
        let context = AgentToolContext::basic("test", sandbox);

        let result = GrepTool::new()
            .call(json!({ "pattern": "needle", "mode": "content" }), &context)
            .await
            .unwrap();
        assert_eq!(result, "a.txt:2:needle");
    }

    #[tokio::test]
    async fn extended_options_are_accepted_without_error() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("a.txt", "one\nneedle\nthree");
        let context = AgentToolContext::basic("test", sandbox);

        let result = GrepTool::new()
            .call(
                json!({
                    "pattern": "needle",
                    "mode": "content",
                    "type": "text",
                    "line_numbers": true,
                    "lines_before": 1,
                    "lines_after": 1,
                    "lines_context": 2,
                    "multiline": false,
                    "offset": 0
                }),
                &context,
            )
            .await
            .unwrap();
        assert_eq!(result, "a.txt:2:needle");
    }

    #[tokio::test]
    async fn path_outside_allowed_dirs_is_denied() {
        use crate::tools::context_impl::AgentToolContext as Ctx;
        use std::path::PathBuf;

        let sandbox = Arc::new(FakeSandbox::new());
        let context = Ctx::new("test".to_string(), Some(PathBuf::from("/workspace")), sandbox)
            .with_allowed_dirs(vec![PathBuf::from("/workspace")]);

        let err = GrepTool::new()
            .call(json!({ "pattern": "needle", "path": "/etc" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::basic("test", sandbox);

        let err = GrepTool::new()
            .call(json!({ "pattern": "x", "mode": "bogus" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidRequest(_)));
    }
}
