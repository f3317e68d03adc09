//! Tool registry for managing and finding tools.

use crate::tools::context::{Tool, ToolContext, ToolDefinition, truncate_for_model};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of the tools available to a turn (C2).
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn add(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

/// The uniform tool-dispatch adapter (`spec.md` §4.2, C2): look `name` up in
/// `registry` and invoke it, translating the outcome into what the model
/// always sees — either the tool's raw success content, or an `ERROR: `
/// message, never a language-level exception. An unknown tool name is itself
/// rendered as an `ERROR:` result rather than panicking, since it reflects a
/// malformed model tool call, not a programming error.
pub async fn dispatch_tool_call(
    registry: &ToolRegistry,
    context: &dyn ToolContext,
    name: &str,
    args: serde_json::Value,
) -> String {
    match registry.find(name) {
        Some(tool) => match tool.call(args, context).await {
            Ok(content) => content,
            Err(e) => format!("ERROR: {}", truncate_for_model(&e.to_string())),
        },
        None => format!("ERROR: unknown tool: {name}"),
    }
}
