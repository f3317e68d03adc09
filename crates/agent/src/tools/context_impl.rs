//! Concrete [`ToolContext`] backed by a [`vessel_sandbox::RemoteSandbox`].

use async_trait::async_trait;
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::tools::context::{ToolContext, ToolError};

/// The `ToolContext` implementation wired into real (and test) sessions.
/// Tools reach the sandbox exclusively through this context — they never
/// hold a sandbox reference themselves.
pub struct AgentToolContext {
    session_id: String,
    cwd: Option<PathBuf>,
    sandbox: Arc<dyn vessel_sandbox::RemoteSandbox>,
    read_only: bool,
    allowed_dirs: Option<Vec<PathBuf>>,
}

impl AgentToolContext {
    pub fn new(
        session_id: String,
        cwd: Option<PathBuf>,
        sandbox: Arc<dyn vessel_sandbox::RemoteSandbox>,
    ) -> Self {
        Self {
            session_id,
            cwd,
            sandbox,
            read_only: false,
            allowed_dirs: None,
        }
    }

    /// A context with no working directory, for tests that only need the
    /// sandbox and session id.
    pub fn basic(session_id: impl Into<String>, sandbox: Arc<dyn vessel_sandbox::RemoteSandbox>) -> Self {
        Self::new(session_id.into(), None, sandbox)
    }

    /// Mark this context as read-only (plan mode): write tools check this
    /// before touching the sandbox and return `PermissionDenied` instead of
    /// attempting the call.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Restrict filesystem-capable tools to the given set of directories
    /// (`spec.md` §4.2). `None` (the default) means validation is disabled;
    /// `Some(vec![])` means every path is rejected.
    pub fn with_allowed_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.allowed_dirs = Some(dirs.into_iter().map(normalize_lexically).collect());
        self
    }

    pub fn allowed_dirs(&self) -> Option<&[PathBuf]> {
        self.allowed_dirs.as_deref()
    }
}

/// Collapse `.`/`..` components without touching the filesystem. Sandbox
/// paths are virtual (and may point at a remote host), so this cannot use
/// `Path::canonicalize` — the allowed-directory check is a lexical, not a
/// filesystem-backed, guarantee.
fn normalize_lexically(path: PathBuf) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[async_trait]
impl ToolContext for AgentToolContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn sandbox(&self) -> &dyn vessel_sandbox::RemoteSandbox {
        self.sandbox.as_ref()
    }

    async fn record_progress(
        &self,
        kind: &str,
        content: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<String, ToolError> {
        tracing::debug!(kind, session_id = %self.session_id, ?metadata, "tool progress: {content}");
        Ok(content)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared guard used by write-capable builtins: returns a `PermissionDenied`
/// `ToolError` when the context is read-only, otherwise `Ok(())`.
pub fn check_writable(context: &dyn ToolContext) -> Result<(), ToolError> {
    if let Some(ctx) = context.as_any().downcast_ref::<AgentToolContext>() {
        if ctx.is_read_only() {
            return Err(ToolError::PermissionDenied(
                "session is in plan mode: write tools are disabled".to_string(),
            ));
        }
    }
    Ok(())
}

/// Shared guard used by every filesystem-capable builtin (`read_file`,
/// `write_file`, `edit_file`, `glob`, `grep`): when the context carries an
/// allowed-directory set, reject any `path` that does not resolve under one
/// of its entries *before* the sandbox is contacted (`spec.md` §4.2, §8
/// Testable Property 5).
pub fn check_path_allowed(context: &dyn ToolContext, path: &str) -> Result<(), ToolError> {
    let Some(ctx) = context.as_any().downcast_ref::<AgentToolContext>() else {
        return Ok(());
    };
    let Some(allowed) = ctx.allowed_dirs() else {
        return Ok(());
    };

    let resolved = normalize_lexically(context.resolve_path(path)?);
    if allowed.iter().any(|dir| resolved.starts_with(dir)) {
        Ok(())
    } else {
        Err(ToolError::AccessDenied("Access denied".to_string()))
    }
}
