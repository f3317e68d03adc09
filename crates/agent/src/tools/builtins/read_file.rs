//! `read_file` builtin: reads a file through the session's remote sandbox.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::context::{CapabilityRequirement, FunctionDefinition, Tool, ToolDefinition, ToolError};
use crate::tools::context::truncate_for_model;
use crate::tools::context_impl::check_path_allowed;
use crate::tools::ToolContext;

pub struct ReadFileTool;

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

/// Render lines `start_idx..end_idx` (0-indexed, half-open) with the
/// six-column right-aligned `<N>→<line>` numbering.
fn render_numbered(lines: &[&str], start_idx: usize, end_idx: usize) -> String {
    let mut out = String::new();
    for (idx, line) in lines.iter().enumerate().take(end_idx).skip(start_idx) {
        out.push_str(&format!("{:>6}\u{2192}{}\n", idx + 1, line));
    }
    out
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: "Read a file from the sandbox workspace. Returns content with \
                    line numbers. Supports reading the full file or a specific line range."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file to read, relative to the session working directory or absolute."
                        },
                        "start_line": {
                            "type": "integer",
                            "description": "Line number to start reading from (1-indexed, inclusive). If omitted, reads from the beginning.",
                            "minimum": 1
                        },
                        "line_count": {
                            "type": "integer",
                            "description": "Number of lines to read starting at start_line. If omitted, reads to end of file.",
                            "minimum": 1
                        }
                    },
                    "required": ["path"]
                }),
            },
        }
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;

        check_path_allowed(context, path)?;

        let start_line_arg = args.get("start_line").and_then(Value::as_u64).map(|v| v as usize);
        let line_count_arg = args.get("line_count").and_then(Value::as_u64).map(|v| v as usize);

        let content = context
            .sandbox()
            .read_file(path)
            .await
            .map_err(|e| ToolError::Sandbox(truncate_for_model(&e.to_string())))?
            .ok_or_else(|| ToolError::InvalidRequest("File not found".to_string()))?;

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let (start_idx, end_idx, truncated_at) = match (start_line_arg, line_count_arg) {
            (None, None) => (0, total_lines, None),
            (Some(start), None) => {
                if start < 1 {
                    return Err(ToolError::InvalidRequest("start_line must be >= 1".to_string()));
                }
                if total_lines > 0 && start > total_lines {
                    return Err(ToolError::InvalidRequest(format!(
                        "start_line {start} exceeds file length {total_lines}"
                    )));
                }
                let start_idx = start.saturating_sub(1).min(total_lines);
                (start_idx, total_lines, None)
            }
            (Some(start), Some(count)) => {
                if start < 1 {
                    return Err(ToolError::InvalidRequest("start_line must be >= 1".to_string()));
                }
                if count < 1 {
                    return Err(ToolError::InvalidRequest("line_count must be >= 1".to_string()));
                }
                if total_lines > 0 && start > total_lines {
                    return Err(ToolError::InvalidRequest(format!(
                        "start_line {start} exceeds file length {total_lines}"
                    )));
                }
                let start_idx = start.saturating_sub(1).min(total_lines);
                let end_idx = (start_idx + count).min(total_lines);
                let truncated_at = if end_idx < total_lines { Some(end_idx) } else { None };
                (start_idx, end_idx, truncated_at)
            }
            (None, Some(_)) => {
                return Err(ToolError::InvalidRequest(
                    "line_count requires start_line to be specified".to_string(),
                ));
            }
        };

        let mut output = String::from("<file>\n");
        output.push_str(&render_numbered(&lines, start_idx, end_idx));
        match truncated_at {
            Some(end) => output.push_str(&format!(
                "\n(File has more lines. Use start_line to read beyond line {end})\n"
            )),
            None => output.push_str(&format!("\n(End of file - total {total_lines} lines)\n")),
        }
        output.push_str("</file>");

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context_impl::AgentToolContext;
    use serde_json::json;
    use std::sync::Arc;
    use vessel_sandbox::FakeSandbox;

    fn context_with(sandbox: &Arc<FakeSandbox>) -> AgentToolContext {
        AgentToolContext::basic("test", sandbox.clone())
    }

    #[tokio::test]
    async fn reads_full_file_with_numbered_lines() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("test.txt", "line 1\nline 2\nline 3");
        let context = context_with(&sandbox);

        let result = ReadFileTool::new()
            .call(json!({ "path": "test.txt" }), &context)
            .await
            .unwrap();

        assert!(result.starts_with("<file>\n"));
        assert!(result.contains("     1\u{2192}line 1"));
        assert!(result.contains("     3\u{2192}line 3"));
        assert!(result.contains("(End of file - total 3 lines)"));
    }

    #[tokio::test]
    async fn start_line_and_count_truncates_with_hint() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("test.txt", "line 1\nline 2\nline 3\nline 4\nline 5");
        let context = context_with(&sandbox);

        let result = ReadFileTool::new()
            .call(json!({ "path": "test.txt", "start_line": 2, "line_count": 2 }), &context)
            .await
            .unwrap();

        assert!(result.contains("     2\u{2192}line 2"));
        assert!(result.contains("     3\u{2192}line 3"));
        assert!(!result.contains("line 1"));
        assert!(result.contains("Use start_line to read beyond line 3"));
    }

    #[tokio::test]
    async fn start_line_zero_is_rejected() {
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.seed_file("test.txt", "line 1");
        let context = context_with(&sandbox);

        let err = ReadFileTool::new()
            .call(json!({ "path": "test.txt", "start_line": 0 }), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start_line must be >= 1"));
    }

    #[tokio::test]
    async fn missing_file_is_invalid_request() {
        let sandbox = Arc::new(FakeSandbox::new());
        let context = context_with(&sandbox);

        let err = ReadFileTool::new()
            .call(json!({ "path": "missing.txt" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidRequest(ref msg) if msg == "File not found"));
    }

    #[tokio::test]
    async fn path_outside_allowed_dirs_is_denied_without_contacting_the_sandbox() {
        use crate::tools::context_impl::AgentToolContext;
        use std::path::PathBuf;

        let sandbox = Arc::new(FakeSandbox::new());
        let context = AgentToolContext::new(
            "test".to_string(),
            Some(PathBuf::from("/workspace")),
            sandbox.clone(),
        )
        .with_allowed_dirs(vec![PathBuf::from("/workspace")]);

        let err = ReadFileTool::new()
            .call(json!({ "path": "/etc/passwd" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied(ref msg) if msg == "Access denied"));
    }
}
