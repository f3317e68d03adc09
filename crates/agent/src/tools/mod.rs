pub mod builtins;
pub mod context;
pub mod context_impl;
pub mod registry;

pub use builtins::{
    EditFileTool, ExecuteBashTool, ExecuteCodeTool, GlobTool, GrepTool, ReadFileTool,
    WriteFileTool, all_builtin_tools,
};
pub use context::{CapabilityRequirement, Tool, ToolContext, ToolDefinition, ToolError};
pub use context_impl::{check_path_allowed, check_writable, AgentToolContext};
pub use registry::{dispatch_tool_call, ToolRegistry};
