use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::client::{join_under, strip_home};
use crate::{
    BashResult, CodeResult, EditOutcome, GrepMatch, GrepMode, GrepOptions, RemoteSandbox,
    SandboxError,
};

/// Reference [`RemoteSandbox`] implementation: JSON over HTTP against a
/// configurable base URL. The wire format on the other side of this client
/// is a vendor detail we don't model beyond "JSON request in, JSON result
/// out, non-2xx is a fault" — see the crate's module doc.
pub struct HttpSandbox {
    base_url: String,
    http: reqwest::Client,
    home: PathBuf,
    sandbox_id: RwLock<Option<String>>,
    request_timeout: Duration,
}

impl HttpSandbox {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            home: PathBuf::from("/home/agent"),
            sandbox_id: RwLock::new(None),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SandboxError> {
        let request = self.http.post(self.endpoint(path)).json(&body).send();
        let resp = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| SandboxError::Timeout(self.request_timeout))?
            .map_err(|e| SandboxError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SandboxError::Fault(text));
        }
        resp.json::<T>()
            .await
            .map_err(|e| SandboxError::Transport(e.to_string()))
    }
}

#[derive(Deserialize)]
struct IdResponse {
    sandbox_id: String,
}

#[async_trait]
impl RemoteSandbox for HttpSandbox {
    async fn initialize(&self, sandbox_id: Option<&str>) -> Result<(), SandboxError> {
        let body = json!({ "sandbox_id": sandbox_id });
        let resp: IdResponse = self.post("sandboxes/attach", body).await?;
        *self.sandbox_id.write().expect("sandbox_id lock poisoned") = Some(resp.sandbox_id);
        Ok(())
    }

    async fn execute_code(&self, source: &str) -> Result<CodeResult, SandboxError> {
        self.post("exec/code", json!({ "source": source })).await
    }

    async fn execute_bash(
        &self,
        cmd: &str,
        cwd: Option<&str>,
        timeout: Duration,
        background: bool,
    ) -> Result<BashResult, SandboxError> {
        self.post(
            "exec/bash",
            json!({
                "cmd": cmd,
                "cwd": cwd,
                "timeout_secs": timeout.as_secs(),
                "background": background,
            }),
        )
        .await
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, SandboxError> {
        let abs = self.normalize_path(path);
        let resp: serde_json::Value = self.post("fs/read", json!({ "path": abs })).await?;
        Ok(resp.get("content").and_then(|v| v.as_str()).map(String::from))
    }

    async fn read_file_range(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Option<String>, SandboxError> {
        let abs = self.normalize_path(path);
        let resp: serde_json::Value = self
            .post(
                "fs/read",
                json!({ "path": abs, "offset": offset, "limit": limit }),
            )
            .await?;
        Ok(resp.get("content").and_then(|v| v.as_str()).map(String::from))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<bool, SandboxError> {
        let abs = self.normalize_path(path);
        let resp: serde_json::Value = self
            .post("fs/write", json!({ "path": abs, "content": content }))
            .await?;
        Ok(resp.get("ok").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn edit_file(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<EditOutcome, SandboxError> {
        let abs = self.normalize_path(path);
        self.post(
            "fs/edit",
            json!({ "path": abs, "old": old, "new": new, "replace_all": replace_all }),
        )
        .await
    }

    async fn glob(&self, pattern: &str, root: &str) -> Result<Vec<String>, SandboxError> {
        let abs_root = self.normalize_path(root);
        let resp: Vec<String> = self
            .post("fs/glob", json!({ "pattern": pattern, "root": abs_root }))
            .await?;
        Ok(resp.into_iter().map(|p| self.virtualize_path(&p)).collect())
    }

    async fn grep(
        &self,
        pattern: &str,
        root: &str,
        options: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, SandboxError> {
        let abs_root = self.normalize_path(root);
        let mode = options.mode.unwrap_or(GrepMode::FilesWithMatches);
        let resp: Vec<GrepMatch> = self
            .post(
                "fs/grep",
                json!({
                    "pattern": pattern,
                    "root": abs_root,
                    "mode": mode,
                    "glob": options.glob,
                    "file_type": options.file_type,
                    "case_insensitive": options.case_insensitive,
                    "line_numbers": options.line_numbers,
                    "lines_after": options.lines_after,
                    "lines_before": options.lines_before,
                    "lines_context": options.lines_context,
                    "multiline": options.multiline,
                    "head_limit": options.head_limit,
                    "offset": options.offset,
                }),
            )
            .await?;
        Ok(resp
            .into_iter()
            .map(|m| GrepMatch {
                path: self.virtualize_path(&m.path),
                ..m
            })
            .collect())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>, SandboxError> {
        let abs = self.normalize_path(path);
        self.post("fs/list", json!({ "path": abs })).await
    }

    async fn download_bytes(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        let abs = self.normalize_path(path);
        let resp = self
            .http
            .post(self.endpoint("fs/download"))
            .json(&json!({ "path": abs }))
            .send()
            .await
            .map_err(|e| SandboxError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SandboxError::Fault(resp.text().await.unwrap_or_default()));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SandboxError::Transport(e.to_string()))
    }

    async fn stop(&self) -> Result<(), SandboxError> {
        let id = self.sandbox_id().ok_or_else(|| {
            SandboxError::Unavailable("no sandbox attached".to_string())
        })?;
        let _: serde_json::Value = self.post("sandboxes/stop", json!({ "sandbox_id": id })).await?;
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), SandboxError> {
        let id = self.sandbox_id().ok_or_else(|| {
            SandboxError::Unavailable("no sandbox attached".to_string())
        })?;
        let _: serde_json::Value =
            self.post("sandboxes/cleanup", json!({ "sandbox_id": id })).await?;
        *self.sandbox_id.write().expect("sandbox_id lock poisoned") = None;
        Ok(())
    }

    fn sandbox_id(&self) -> Option<String> {
        self.sandbox_id
            .read()
            .expect("sandbox_id lock poisoned")
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

    #[test]
    fn normalize_and_virtualize_round_trip() {
        let sandbox = HttpSandbox::new("http://localhost:9999");
        let abs = sandbox.normalize_path("src/main.rs");
        assert_eq!(abs, "/home/agent/src/main.rs");
        assert_eq!(sandbox.virtualize_path(&abs), "src/main.rs");
    }

    #[test]
    fn normalize_path_always_anchors_under_home() {
        let sandbox = HttpSandbox::new("http://localhost:9999");
        assert_eq!(
            sandbox.normalize_path("/home/agent/a.txt"),
            "/home/agent/home/agent/a.txt"
        );
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let sandbox = HttpSandbox::new("http://localhost:9999/");
        assert_eq!(sandbox.endpoint("fs/read"), "http://localhost:9999/fs/read");
    }
}
