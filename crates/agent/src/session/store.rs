//! Session store (C4): persist/restore `{agent -> sandbox_id,
//! config_fingerprint, last_used}` at a well-known per-agent path
//! (`spec.md` §4.4, §6.1).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{AgentIdentity, ConfigFingerprint};

/// Persisted records older than this are treated as absent and removed
/// (`spec.md` §3, Invariant 4).
pub const MAX_SESSION_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// How long to wait for the advisory lock before giving up
/// (`SPEC_FULL.md` §4.4, ADDED).
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid session record: {0}")]
    Invalid(String),
    #[error("another instance is attached to this agent's session store")]
    Locked,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// `{ sandbox_id, config_hash, created_at, last_used }` (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub sandbox_id: String,
    pub config_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_used: OffsetDateTime,
}

impl PersistedSession {
    pub fn config_fingerprint(&self) -> ConfigFingerprint {
        ConfigFingerprint::from_persisted(self.config_hash.clone())
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        match u64::try_from((now - self.last_used).whole_seconds()) {
            Ok(age_secs) => Duration::from_secs(age_secs) > MAX_SESSION_AGE,
            // last_used is in the future (clock skew) — treat as fresh.
            Err(_) => false,
        }
    }
}

/// Persists [`PersistedSession`] records at `<state_root>/<agent>/session.json`.
pub struct SessionStore {
    state_root: PathBuf,
}

impl SessionStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    fn session_path(&self, agent: &AgentIdentity) -> PathBuf {
        self.state_root.join(agent).join("session.json")
    }

    fn lock_path(&self, agent: &AgentIdentity) -> PathBuf {
        self.state_root.join(agent).join("session.json.lock")
    }

    fn with_lock<T>(
        &self,
        agent: &AgentIdentity,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        use fs4::fs_std::FileExt as _;

        let dir = self.state_root.join(agent);
        std::fs::create_dir_all(&dir)?;
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path(agent))?;

        let deadline = std::time::Instant::now() + LOCK_TIMEOUT;
        loop {
            if lock_file.try_lock_exclusive().is_ok() {
                break;
            }
            if std::time::Instant::now() >= deadline {
                return Err(StoreError::Locked);
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        let result = f();
        let _ = lock_file.unlock();
        result
    }

    /// Load the persisted record for `agent`.
    ///
    /// Returns `Ok(None)` on: file missing, JSON invalid, required fields
    /// missing, or age > 24h — in every such case the offending file (if
    /// any) is deleted as a side effect (`spec.md` §4.4).
    pub fn load(&self, agent: &AgentIdentity) -> Result<Option<PersistedSession>, StoreError> {
        self.with_lock(agent, || self.load_locked(agent))
    }

    fn load_locked(&self, agent: &AgentIdentity) -> Result<Option<PersistedSession>, StoreError> {
        let path = self.session_path(agent);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed: Result<PersistedSession, _> = serde_json::from_str(&raw);
        let session = match parsed {
            Ok(session) => session,
            Err(_) => {
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        };

        if session.is_expired(OffsetDateTime::now_utc()) {
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Persist `(sandbox_id, fingerprint)` with both timestamps set to now.
    pub fn save(
        &self,
        agent: &AgentIdentity,
        sandbox_id: &str,
        fingerprint: &ConfigFingerprint,
    ) -> Result<(), StoreError> {
        self.with_lock(agent, || {
            let now = OffsetDateTime::now_utc();
            let record = PersistedSession {
                sandbox_id: sandbox_id.to_string(),
                config_hash: fingerprint.as_str().to_string(),
                created_at: now,
                last_used: now,
            };
            self.write_locked(agent, &record)
        })
    }

    /// Refresh `last_used` only, leaving `sandbox_id`/`config_hash` intact.
    /// A no-op if no record exists.
    pub fn touch(&self, agent: &AgentIdentity) -> Result<(), StoreError> {
        self.with_lock(agent, || {
            let Some(mut record) = self.load_locked(agent)? else {
                return Ok(());
            };
            record.last_used = OffsetDateTime::now_utc();
            self.write_locked(agent, &record)
        })
    }

    /// Remove the persisted record for `agent`, if any.
    pub fn delete(&self, agent: &AgentIdentity) -> Result<(), StoreError> {
        self.with_lock(agent, || {
            let path = self.session_path(agent);
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn write_locked(&self, agent: &AgentIdentity, record: &PersistedSession) -> Result<(), StoreError> {
        let path = self.session_path(agent);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}

/// `<state_root>/<agent>/session.json`, the well-known per-agent path.
pub fn session_path(state_root: &Path, agent: &AgentIdentity) -> PathBuf {
    state_root.join(agent).join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(s: &str) -> ConfigFingerprint {
        ConfigFingerprint::from_persisted(s.to_string())
    }

    #[test]
    fn save_then_load_round_trips_modulo_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&"agent-a".to_string(), "sbx-1", &fp("abcd1234")).unwrap();

        let loaded = store.load(&"agent-a".to_string()).unwrap().unwrap();
        assert_eq!(loaded.sandbox_id, "sbx-1");
        assert_eq!(loaded.config_hash, "abcd1234");
    }

    #[test]
    fn load_of_missing_agent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load(&"nope".to_string()).unwrap().is_none());
    }

    #[test]
    fn load_deletes_invalid_json_and_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let agent = "agent-a".to_string();
        std::fs::create_dir_all(dir.path().join(&agent)).unwrap();
        std::fs::write(dir.path().join(&agent).join("session.json"), "{not json").unwrap();

        let store = SessionStore::new(dir.path());
        assert!(store.load(&agent).unwrap().is_none());
        assert!(!dir.path().join(&agent).join("session.json").exists());
    }

    #[test]
    fn load_deletes_expired_record() {
        let dir = tempfile::tempdir().unwrap();
        let agent = "agent-a".to_string();
        std::fs::create_dir_all(dir.path().join(&agent)).unwrap();
        let stale = PersistedSession {
            sandbox_id: "sbx-1".to_string(),
            config_hash: "abcd1234".to_string(),
            created_at: OffsetDateTime::now_utc() - time::Duration::hours(30),
            last_used: OffsetDateTime::now_utc() - time::Duration::hours(25),
        };
        std::fs::write(
            dir.path().join(&agent).join("session.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let store = SessionStore::new(dir.path());
        assert!(store.load(&agent).unwrap().is_none());
        assert!(!dir.path().join(&agent).join("session.json").exists());
    }

    #[test]
    fn touch_refreshes_last_used_but_not_sandbox_id() {
        let dir = tempfile::tempdir().unwrap();
        let agent = "agent-a".to_string();
        let store = SessionStore::new(dir.path());
        store.save(&agent, "sbx-1", &fp("abcd1234")).unwrap();
        let before = store.load(&agent).unwrap().unwrap();

        std::thread::sleep(Duration::from_millis(10));
        store.touch(&agent).unwrap();
        let after = store.load(&agent).unwrap().unwrap();

        assert_eq!(after.sandbox_id, before.sandbox_id);
        assert!(after.last_used >= before.last_used);
    }

    #[test]
    fn delete_removes_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let agent = "agent-a".to_string();
        let store = SessionStore::new(dir.path());
        store.save(&agent, "sbx-1", &fp("abcd1234")).unwrap();
        store.delete(&agent).unwrap();
        assert!(store.load(&agent).unwrap().is_none());
    }
}
