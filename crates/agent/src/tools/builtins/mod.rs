pub mod edit_file;
pub mod execute_bash;
pub mod execute_code;
pub mod glob;
pub mod grep;
pub mod helpers;
pub mod read_file;
pub mod write_file;

pub use edit_file::EditFileTool;
pub use execute_bash::ExecuteBashTool;
pub use execute_code::ExecuteCodeTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

use crate::tools::Tool;
use std::sync::Arc;

/// The closed tool set exposed to the model (`spec.md` §4.2). Canonical
/// source of truth for session registration.
pub fn all_builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadFileTool::new()),
        Arc::new(WriteFileTool::new()),
        Arc::new(EditFileTool::new()),
        Arc::new(GlobTool::new()),
        Arc::new(GrepTool::new()),
        Arc::new(ExecuteBashTool::new()),
        Arc::new(ExecuteCodeTool::new()),
    ]
}
