use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors surfaced by a [`RemoteSandbox`] implementation.
///
/// `Fault` is deliberately coarse — the fault detector (C7) classifies
/// opaque provider errors by substring match, not by variant, because the
/// remote vendor's wire protocol is out of scope for this crate (see
/// `spec.md` §6.2). Callers that need structured classification should
/// match on the message, not add new variants here.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
    #[error("sandbox fault: {0}")]
    Fault(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result of `execute_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub created_files: Vec<String>,
}

/// Result of `execute_bash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BashResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Result of `edit_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOutcome {
    pub ok: bool,
    pub changed: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Grep output mode, mirrored from spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrepMode {
    FilesWithMatches,
    Content,
    Count,
}

/// Options accepted by `grep`, conventional regex + context flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrepOptions {
    pub mode: Option<GrepMode>,
    pub glob: Option<String>,
    pub file_type: Option<String>,
    pub case_insensitive: bool,
    pub line_numbers: bool,
    pub lines_after: Option<usize>,
    pub lines_before: Option<usize>,
    pub lines_context: Option<usize>,
    pub multiline: bool,
    pub head_limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One grep hit in `content` mode: `<virtual-path>:<line>:<text>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepMatch {
    pub path: String,
    pub line: Option<usize>,
    pub text: String,
}

/// The opaque remote-exec/filesystem client contract (C1).
///
/// All operations are cancellable by dropping the future; any operation may
/// fail with [`SandboxError::Fault`] to signal a transient disconnect that
/// the caller (C7) may choose to retry once per turn.
#[async_trait]
pub trait RemoteSandbox: Send + Sync {
    /// Bring up a fresh sandbox, or reattach to `sandbox_id` if given.
    async fn initialize(&self, sandbox_id: Option<&str>) -> Result<(), SandboxError>;

    async fn execute_code(&self, source: &str) -> Result<CodeResult, SandboxError>;

    async fn execute_bash(
        &self,
        cmd: &str,
        cwd: Option<&str>,
        timeout: std::time::Duration,
        background: bool,
    ) -> Result<BashResult, SandboxError>;

    async fn read_file(&self, path: &str) -> Result<Option<String>, SandboxError>;

    async fn read_file_range(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Option<String>, SandboxError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<bool, SandboxError>;

    async fn edit_file(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<EditOutcome, SandboxError>;

    /// Ordered list of absolute paths, by modified-time descending.
    async fn glob(&self, pattern: &str, root: &str) -> Result<Vec<String>, SandboxError>;

    async fn grep(
        &self,
        pattern: &str,
        root: &str,
        options: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, SandboxError>;

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, SandboxError>;

    async fn download_bytes(&self, path: &str) -> Result<Vec<u8>, SandboxError>;

    /// Preserve the sandbox for future reattach.
    async fn stop(&self) -> Result<(), SandboxError>;

    /// Destroy the sandbox.
    async fn cleanup(&self) -> Result<(), SandboxError>;

    fn sandbox_id(&self) -> Option<String>;

    /// Map a user-visible, working-directory-relative path to the absolute
    /// form the backend requires.
    fn normalize_path(&self, user: &str) -> String;

    /// Map an absolute backend path back to its user-visible form.
    fn virtualize_path(&self, abs: &str) -> String;
}

/// Join a user path against a sandbox home directory the way
/// `normalize_path`/`virtualize_path` implementations conventionally do.
pub(crate) fn join_under(home: &Path, user: &str) -> PathBuf {
    let user = user.trim_start_matches('/');
    if user.is_empty() {
        home.to_path_buf()
    } else {
        home.join(user)
    }
}

pub(crate) fn strip_home(home: &Path, abs: &str) -> String {
    let abs_path = Path::new(abs);
    match abs_path.strip_prefix(home) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => abs.to_string(),
    }
}
