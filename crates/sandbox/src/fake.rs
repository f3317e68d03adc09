use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{join_under, strip_home};
use crate::{
    BashResult, CodeResult, EditOutcome, GrepMatch, GrepMode, GrepOptions, RemoteSandbox,
    SandboxError,
};

struct FakeState {
    files: HashMap<String, String>,
    sandbox_id: Option<String>,
    /// When set, the next matching operation returns this fault instead of
    /// running normally — lets tests drive C7's fault-recovery paths.
    inject_fault_once: Option<String>,
}

/// In-memory [`RemoteSandbox`] double: a `HashMap<String, String>`
/// filesystem keyed by absolute path, plus a fake bash runner that always
/// succeeds with empty output unless a test preloads a response. Used by
/// the `agent` and `cli` crates' test suites so session/tool/executor logic
/// is exercisable without a live HTTP backend.
pub struct FakeSandbox {
    home: PathBuf,
    state: Mutex<FakeState>,
    bash_responses: Mutex<HashMap<String, BashResult>>,
}

impl Default for FakeSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self {
            home: PathBuf::from("/home/agent"),
            state: Mutex::new(FakeState {
                files: HashMap::new(),
                sandbox_id: None,
                inject_fault_once: None,
            }),
            bash_responses: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a file at a workspace-relative path, as if it had been written
    /// by a prior turn.
    pub fn seed_file(&self, path: &str, content: impl Into<String>) {
        let abs = self.normalize_path(path);
        self.state
            .lock()
            .expect("fake sandbox lock poisoned")
            .files
            .insert(abs, content.into());
    }

    /// Queue a canned response for the next `execute_bash` call matching
    /// `cmd` exactly.
    pub fn seed_bash(&self, cmd: &str, result: BashResult) {
        self.bash_responses
            .lock()
            .expect("fake sandbox lock poisoned")
            .insert(cmd.to_string(), result);
    }

    /// Make the next call fail with [`SandboxError::Fault`] carrying
    /// `message`, then behave normally afterward.
    pub fn inject_fault_once(&self, message: impl Into<String>) {
        self.state
            .lock()
            .expect("fake sandbox lock poisoned")
            .inject_fault_once = Some(message.into());
    }

    fn take_injected_fault(&self) -> Option<SandboxError> {
        self.state
            .lock()
            .expect("fake sandbox lock poisoned")
            .inject_fault_once
            .take()
            .map(SandboxError::Fault)
    }
}

#[async_trait]
impl RemoteSandbox for FakeSandbox {
    async fn initialize(&self, sandbox_id: Option<&str>) -> Result<(), SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let mut state = self.state.lock().expect("fake sandbox lock poisoned");
        state.sandbox_id = Some(sandbox_id.map(str::to_string).unwrap_or_else(|| "fake-sandbox".to_string()));
        Ok(())
    }

    async fn execute_code(&self, source: &str) -> Result<CodeResult, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        Ok(CodeResult {
            ok: true,
            stdout: format!("executed {} bytes", source.len()),
            stderr: String::new(),
            created_files: Vec::new(),
        })
    }

    async fn execute_bash(
        &self,
        cmd: &str,
        _cwd: Option<&str>,
        _timeout: Duration,
        _background: bool,
    ) -> Result<BashResult, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let canned = self
            .bash_responses
            .lock()
            .expect("fake sandbox lock poisoned")
            .get(cmd)
            .cloned();
        Ok(canned.unwrap_or(BashResult {
            ok: true,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        }))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let abs = self.normalize_path(path);
        Ok(self
            .state
            .lock()
            .expect("fake sandbox lock poisoned")
            .files
            .get(&abs)
            .cloned())
    }

    async fn read_file_range(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Option<String>, SandboxError> {
        let full = self.read_file(path).await?;
        Ok(full.map(|content| {
            content
                .lines()
                .skip(offset)
                .take(limit)
                .collect::<Vec<_>>()
                .join("\n")
        }))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<bool, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let abs = self.normalize_path(path);
        self.state
            .lock()
            .expect("fake sandbox lock poisoned")
            .files
            .insert(abs, content.to_string());
        Ok(true)
    }

    async fn edit_file(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<EditOutcome, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let abs = self.normalize_path(path);
        let mut state = self.state.lock().expect("fake sandbox lock poisoned");
        let Some(content) = state.files.get(&abs).cloned() else {
            return Ok(EditOutcome {
                ok: false,
                changed: None,
                message: None,
                error: Some(format!("no such file: {path}")),
            });
        };
        if !content.contains(old) {
            return Ok(EditOutcome {
                ok: false,
                changed: Some(false),
                message: None,
                error: Some("old text not found".to_string()),
            });
        }
        let updated = if replace_all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };
        state.files.insert(abs, updated);
        Ok(EditOutcome {
            ok: true,
            changed: Some(true),
            message: Some("edit applied".to_string()),
            error: None,
        })
    }

    async fn glob(&self, pattern: &str, root: &str) -> Result<Vec<String>, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let abs_root = self.normalize_path(root);
        let glob_pattern = glob::Pattern::new(pattern)
            .map_err(|e| SandboxError::Fault(format!("invalid glob pattern: {e}")))?;
        let state = self.state.lock().expect("fake sandbox lock poisoned");
        let mut matches: Vec<String> = state
            .files
            .keys()
            .filter(|abs| abs.starts_with(&abs_root))
            .filter(|abs| {
                let rel = abs.strip_prefix(&abs_root).unwrap_or(abs).trim_start_matches('/');
                glob_pattern.matches(rel)
            })
            .cloned()
            .collect();
        matches.sort();
        Ok(matches.into_iter().map(|p| self.virtualize_path(&p)).collect())
    }

    async fn grep(
        &self,
        pattern: &str,
        root: &str,
        options: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let abs_root = self.normalize_path(root);
        let regex = if options.case_insensitive {
            regex::RegexBuilder::new(pattern).case_insensitive(true).build()
        } else {
            regex::RegexBuilder::new(pattern).build()
        }
        .map_err(|e| SandboxError::Fault(format!("invalid grep pattern: {e}")))?;

        let mode = options.mode.unwrap_or(GrepMode::FilesWithMatches);
        let state = self.state.lock().expect("fake sandbox lock poisoned");
        let mut results = Vec::new();
        for (abs, content) in state.files.iter().filter(|(abs, _)| abs.starts_with(&abs_root)) {
            match mode {
                GrepMode::FilesWithMatches => {
                    if regex.is_match(content) {
                        results.push(GrepMatch {
                            path: self.virtualize_path(abs),
                            line: None,
                            text: String::new(),
                        });
                    }
                }
                GrepMode::Count => {
                    let count = content.lines().filter(|l| regex.is_match(l)).count();
                    if count > 0 {
                        results.push(GrepMatch {
                            path: self.virtualize_path(abs),
                            line: None,
                            text: count.to_string(),
                        });
                    }
                }
                GrepMode::Content => {
                    for (idx, line) in content.lines().enumerate() {
                        if regex.is_match(line) {
                            results.push(GrepMatch {
                                path: self.virtualize_path(abs),
                                line: Some(idx + 1),
                                text: line.to_string(),
                            });
                        }
                    }
                }
            }
        }
        if let Some(limit) = options.head_limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, SandboxError> {
        if let Some(err) = self.take_injected_fault() {
            return Err(err);
        }
        let abs = self.normalize_path(path);
        let state = self.state.lock().expect("fake sandbox lock poisoned");
        let mut names: Vec<String> = state
            .files
            .keys()
            .filter_map(|f| f.strip_prefix(&abs))
            .map(|rel| rel.trim_start_matches('/').to_string())
            .filter(|rel| !rel.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn download_bytes(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        Ok(self
            .read_file(path)
            .await?
            .unwrap_or_default()
            .into_bytes())
    }

    async fn stop(&self) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), SandboxError> {
        let mut state = self.state.lock().expect("fake sandbox lock poisoned");
        state.files.clear();
        state.sandbox_id = None;
        Ok(())
    }

    fn sandbox_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("fake sandbox lock poisoned")
            .sandbox_id
            .clone()
    }

    fn normalize_path(&self, user: &str) -> String {
        join_under(&self.home, user).to_string_lossy().into_owned()
    }

    fn virtualize_path(&self, abs: &str) -> String {
        strip_home(&self.home, abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let sandbox = FakeSandbox::new();
        sandbox.write_file("notes.txt", "hello").await.unwrap();
        assert_eq!(
            sandbox.read_file("notes.txt").await.unwrap(),
            Some("hello".to_string())
        );
    }

    #[tokio::test]
    async fn edit_file_reports_missing_old_text() {
        let sandbox = FakeSandbox::new();
        sandbox.seed_file("a.txt", "one two three");
        let outcome = sandbox.edit_file("a.txt", "four", "five", false).await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("old text not found"));
    }

    #[tokio::test]
    async fn edit_file_replace_all_replaces_every_occurrence() {
        let sandbox = FakeSandbox::new();
        sandbox.seed_file("a.txt", "foo foo foo");
        sandbox.edit_file("a.txt", "foo", "bar", true).await.unwrap();
        assert_eq!(
            sandbox.read_file("a.txt").await.unwrap(),
            Some("bar bar bar".to_string())
        );
    }

    #[tokio::test]
    async fn injected_fault_surfaces_once_then_clears() {
        let sandbox = FakeSandbox::new();
        sandbox.inject_fault_once("sandbox disconnected");
        let err = sandbox.read_file("missing.txt").await.unwrap_err();
        assert!(matches!(err, SandboxError::Fault(msg) if msg == "sandbox disconnected"));
        assert_eq!(sandbox.read_file("missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn glob_matches_under_root() {
        let sandbox = FakeSandbox::new();
        sandbox.seed_file("src/main.rs", "fn main() {}");
        sandbox.seed_file("src/lib.rs", "pub fn run() {}");
        sandbox.seed_file("README.md", "docs");
        let matches = sandbox.glob("*.rs", "src").await.unwrap();
        assert_eq!(matches, vec!["src/lib.rs".to_string(), "src/main.rs".to_string()]);
    }

    #[tokio::test]
    async fn grep_content_mode_reports_line_numbers() {
        let sandbox = FakeSandbox::new();
        sandbox.seed_file("a.txt", "one\ntwo\nthree two");
        let hits = sandbox
            .grep("two", ".", &GrepOptions { mode: Some(GrepMode::Content), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line, Some(2));
        assert_eq!(hits[1].line, Some(3));
    }

    #[tokio::test]
    async fn cleanup_clears_files_and_sandbox_id() {
        let sandbox = FakeSandbox::new();
        sandbox.initialize(None).await.unwrap();
        sandbox.seed_file("a.txt", "x");
        sandbox.cleanup().await.unwrap();
        assert_eq!(sandbox.sandbox_id(), None);
        assert_eq!(sandbox.read_file("a.txt").await.unwrap(), None);
    }
}
