//! Config-file loading (external collaborator, `SPEC_FULL.md` §1/§3 ADDED).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vessel_agent::CliConfig;

/// `~/.config/<agent>/config.toml`, or the explicit override from `--config`.
pub fn config_path(agent: &str, override_path: Option<&str>) -> PathBuf {
    if let Some(p) = override_path {
        return PathBuf::from(p);
    }
    config_root().join(agent).join("config.toml")
}

/// `~/.config` (or the platform equivalent via `dirs`), the parent of every
/// agent's config and state directory.
pub fn config_root() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Load `path` as a [`CliConfig`], falling back to defaults if the file does
/// not exist yet (first run for a brand-new agent profile).
pub fn load_config(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn loads_a_well_formed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sandbox_base_url = \"https://sandbox.example\"\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sandbox_base_url, "https://sandbox.example");
    }
}
