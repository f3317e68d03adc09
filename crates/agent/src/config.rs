//! Session-relevant configuration and the [`ConfigFingerprint`] digest
//! (`spec.md` §3). Everything here is pure data: loading a TOML file and
//! acting on the result (bringing up a sandbox, wiring logging) is the
//! `cli` crate's job.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// An opaque short string naming an agent profile. Uniquely keys all
/// persisted sandbox state (`spec.md` §3).
pub type AgentIdentity = String;

/// How a tool server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
        };
        f.write_str(s)
    }
}

/// One entry of the tool-server registry discovered at session start.
/// Fingerprint-relevant fields: `name`, `enabled`, `transport`, `command`,
/// `args` (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolServerDescriptor {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub transport: TransportKind,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// The external-collaborator configuration record that feeds
/// [`ConfigFingerprint`]. Loaded from a TOML file by the `cli` crate; only
/// the first five fields are fingerprint-relevant — `default_model` and
/// `log_level` may change without invalidating a cached sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    pub sandbox_base_url: String,
    #[serde(default = "default_runtime_version")]
    pub sandbox_runtime_version: String,
    #[serde(default)]
    pub snapshot_enabled: bool,
    #[serde(default)]
    pub snapshot_name: Option<String>,
    #[serde(default)]
    pub mcp_servers: Vec<ToolServerDescriptor>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_runtime_version() -> String {
    "latest".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            sandbox_base_url: "https://sandbox.invalid".to_string(),
            sandbox_runtime_version: default_runtime_version(),
            snapshot_enabled: false,
            snapshot_name: None,
            mcp_servers: Vec::new(),
            default_model: None,
            log_level: default_log_level(),
        }
    }
}

/// A stable 8-hex-char digest over the session-relevant fields of a
/// [`CliConfig`] (`spec.md` §3). Two configurations yielding the same
/// fingerprint must be behaviourally interchangeable for any cached
/// sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse back from a persisted 8-hex-char string without re-validating
    /// provenance — used when reading `session.json` off disk.
    pub fn from_persisted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of the session-relevant portion of `config`.
///
/// Fields are ordered canonically (tool servers sorted by name, then by the
/// rest of the descriptor) before digesting, so two configurations that
/// differ only in declaration order still hash identically.
pub fn fingerprint(config: &CliConfig) -> ConfigFingerprint {
    let mut servers = config.mcp_servers.clone();
    servers.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.enabled.cmp(&b.enabled))
            .then(a.transport.cmp(&b.transport))
            .then(a.command.cmp(&b.command))
            .then(a.args.cmp(&b.args))
    });

    let mut hasher = Sha256::new();
    hasher.update(config.sandbox_base_url.as_bytes());
    hasher.update([0u8]);
    hasher.update(config.sandbox_runtime_version.as_bytes());
    hasher.update([0u8]);
    hasher.update([config.snapshot_enabled as u8]);
    hasher.update(config.snapshot_name.as_deref().unwrap_or("").as_bytes());
    hasher.update([0u8]);
    for server in &servers {
        hasher.update(server.name.as_bytes());
        hasher.update([server.enabled as u8]);
        hasher.update(server.transport.to_string().as_bytes());
        hasher.update(server.command.as_bytes());
        for arg in &server.args {
            hasher.update(arg.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xffu8]);
    }

    let digest = hasher.finalize();
    ConfigFingerprint(hex::encode(&digest[..4]))
}

/// Optional free-text instructions loaded from `~/.config/<agent>/agent.md`
/// (user memory) and `.agent/agent.md` in the current directory (project
/// memory), concatenated under headers and appended to the system prompt
/// (`SPEC_FULL.md` §3, ADDED).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentMemory {
    pub user_instructions: Option<String>,
    pub project_instructions: Option<String>,
}

impl AgentMemory {
    /// Load user memory from `<config_root>/<agent>/agent.md` and project
    /// memory from `.agent/agent.md` under `cwd`. Missing files are not
    /// an error — they simply leave the corresponding field `None`.
    pub fn load(config_root: &Path, agent: &AgentIdentity, cwd: &Path) -> Self {
        let user_instructions = std::fs::read_to_string(user_memory_path(config_root, agent)).ok();
        let project_instructions = std::fs::read_to_string(cwd.join(".agent").join("agent.md")).ok();
        Self {
            user_instructions,
            project_instructions,
        }
    }

    /// Render the combined instructions block appended to the system
    /// prompt, or `None` if neither memory file exists.
    pub fn render(&self) -> Option<String> {
        if self.user_instructions.is_none() && self.project_instructions.is_none() {
            return None;
        }
        let mut out = String::new();
        if let Some(text) = &self.user_instructions {
            out.push_str("## User Instructions\n");
            out.push_str(text);
            out.push('\n');
        }
        if let Some(text) = &self.project_instructions {
            out.push_str("## Project Instructions\n");
            out.push_str(text);
            out.push('\n');
        }
        Some(out)
    }
}

/// `<config_root>/<agent>/agent.md`, the per-agent user memory file.
pub fn user_memory_path(config_root: &Path, agent: &AgentIdentity) -> PathBuf {
    config_root.join(agent).join("agent.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CliConfig {
        CliConfig {
            sandbox_base_url: "https://sandbox.example".to_string(),
            sandbox_runtime_version: "v1".to_string(),
            snapshot_enabled: true,
            snapshot_name: Some("snap-1".to_string()),
            mcp_servers: vec![ToolServerDescriptor {
                name: "fs".to_string(),
                enabled: true,
                transport: TransportKind::Stdio,
                command: "fs-server".to_string(),
                args: vec!["--root".to_string(), "/".to_string()],
            }],
            default_model: Some("model-a".to_string()),
            log_level: "debug".to_string(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let config = base_config();
        assert_eq!(fingerprint(&config), fingerprint(&config));
    }

    #[test]
    fn fingerprint_is_8_lowercase_hex_chars() {
        let fp = fingerprint(&base_config());
        assert_eq!(fp.as_str().len(), 8);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_ignores_non_session_fields() {
        let mut other = base_config();
        other.default_model = Some("model-b".to_string());
        other.log_level = "trace".to_string();
        assert_eq!(fingerprint(&base_config()), fingerprint(&other));
    }

    #[test]
    fn fingerprint_changes_when_base_url_changes() {
        let mut other = base_config();
        other.sandbox_base_url = "https://sandbox.other".to_string();
        assert_ne!(fingerprint(&base_config()), fingerprint(&other));
    }

    #[test]
    fn fingerprint_ignores_declaration_order_of_tool_servers() {
        let mut a = base_config();
        a.mcp_servers.push(ToolServerDescriptor {
            name: "browser".to_string(),
            enabled: true,
            transport: TransportKind::Http,
            command: String::new(),
            args: vec![],
        });
        let mut b = a.clone();
        b.mcp_servers.reverse();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn agent_memory_render_is_none_when_both_files_are_missing() {
        let memory = AgentMemory {
            user_instructions: None,
            project_instructions: None,
        };
        assert_eq!(memory.render(), None);
    }

    #[test]
    fn agent_memory_render_includes_both_sections() {
        let memory = AgentMemory {
            user_instructions: Some("be terse".to_string()),
            project_instructions: Some("use snake_case".to_string()),
        };
        let rendered = memory.render().unwrap();
        assert!(rendered.contains("## User Instructions\nbe terse"));
        assert!(rendered.contains("## Project Instructions\nuse snake_case"));
    }
}
