//! Session manager (C5): resolves a live `Session` for `(agent,
//! current_config)`, acquiring, reattaching, or discarding cached sandbox
//! handles (`spec.md` §4.4, steps 1-6).

use std::sync::Arc;

use crate::config::{AgentIdentity, CliConfig, fingerprint};
use crate::session::store::{SessionStore, StoreError};
use crate::tools::registry::ToolRegistry;
use vessel_sandbox::RemoteSandbox;

/// In-memory triple `{ sandbox, tool_registry, agent_name }`
/// (`spec.md` §3). Exclusively owned by the [`SessionManager`]; lent by
/// reference to the executor for the duration of one turn.
pub struct Session {
    pub sandbox: Arc<dyn RemoteSandbox>,
    pub tool_registry: ToolRegistry,
    pub agent_name: AgentIdentity,
}

/// Whether the caller explicitly supplied a sandbox id (`--sandbox-id`),
/// in which case persistence, not lookup, governs step 2 of `spec.md` §4.4.
pub enum SandboxRequest {
    /// Use whatever is cached for `agent`, falling back to a fresh sandbox.
    Cached,
    /// Use this specific id regardless of what is cached.
    Explicit(String),
    /// Always create a fresh sandbox (`--new-sandbox`).
    Fresh,
}

pub struct SessionManager {
    store: SessionStore,
    persistence_enabled: bool,
}

impl SessionManager {
    pub fn new(store: SessionStore, persistence_enabled: bool) -> Self {
        Self {
            store,
            persistence_enabled,
        }
    }

    /// Resolve a [`Session`] for `(agent, config)` per the six-step
    /// algorithm in `spec.md` §4.4.
    pub async fn acquire(
        &self,
        agent: &AgentIdentity,
        config: &CliConfig,
        sandbox: Arc<dyn RemoteSandbox>,
        tool_registry: ToolRegistry,
        request: SandboxRequest,
    ) -> Result<Session, StoreError> {
        let cur_fp = fingerprint(config);

        // Step 2: explicit sandbox id takes priority.
        if let SandboxRequest::Explicit(id) = &request {
            if sandbox.initialize(Some(id)).await.is_ok() {
                if self.persistence_enabled {
                    self.store.save(agent, id, &cur_fp)?;
                }
                return Ok(Session {
                    sandbox,
                    tool_registry,
                    agent_name: agent.clone(),
                });
            }
            // fall through to step 5, with persistence left to this caller's choice.
            return self.bring_up_fresh(agent, &cur_fp, sandbox, tool_registry).await;
        }

        if matches!(request, SandboxRequest::Fresh) {
            self.store.delete(agent)?;
            return self.bring_up_fresh(agent, &cur_fp, sandbox, tool_registry).await;
        }

        // Step 3: look up the cached record.
        if let Some(record) = self.store.load(agent)? {
            if record.config_fingerprint() == cur_fp {
                if sandbox.initialize(Some(&record.sandbox_id)).await.is_ok() {
                    self.store.touch(agent)?;
                    return Ok(Session {
                        sandbox,
                        tool_registry,
                        agent_name: agent.clone(),
                    });
                }
                // Step 3 reattach failed -> step 4.
                self.store.delete(agent)?;
            } else {
                // Fingerprint drift -> step 4.
                self.store.delete(agent)?;
            }
        }

        // Step 5: bring up fresh.
        self.bring_up_fresh(agent, &cur_fp, sandbox, tool_registry).await
    }

    async fn bring_up_fresh(
        &self,
        agent: &AgentIdentity,
        cur_fp: &crate::config::ConfigFingerprint,
        sandbox: Arc<dyn RemoteSandbox>,
        tool_registry: ToolRegistry,
    ) -> Result<Session, StoreError> {
        sandbox
            .initialize(None)
            .await
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        if self.persistence_enabled {
            if let Some(id) = sandbox.sandbox_id() {
                self.store.save(agent, &id, cur_fp)?;
            }
        }

        Ok(Session {
            sandbox,
            tool_registry,
            agent_name: agent.clone(),
        })
    }

    /// Teardown per `spec.md` §4.4: `stop` preserves the sandbox for a
    /// future reattach, `cleanup` destroys it. Callers should prefer
    /// `stop` when persistence is enabled and the turn finished without
    /// error, `cleanup` otherwise.
    pub async fn teardown(&self, session: &Session, preserve: bool) -> Result<(), StoreError> {
        let result = if preserve {
            session.sandbox.stop().await
        } else {
            session.sandbox.cleanup().await
        };
        if result.is_err() && !preserve {
            self.store.delete(&session.agent_name)?;
        }
        result.map_err(|e| StoreError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolServerDescriptor;
    use vessel_sandbox::FakeSandbox;

    fn config() -> CliConfig {
        CliConfig {
            sandbox_base_url: "https://sandbox.example".to_string(),
            ..Default::default()
        }
    }

    fn config_with_server(name: &str) -> CliConfig {
        let mut c = config();
        c.mcp_servers.push(ToolServerDescriptor {
            name: name.to_string(),
            enabled: true,
            transport: crate::config::TransportKind::Stdio,
            command: "x".to_string(),
            args: vec![],
        });
        c
    }

    #[tokio::test]
    async fn s1_happy_reattach_reuses_cached_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let cfg = config();
        let fp = fingerprint(&cfg);
        store.save(&"agent-a".to_string(), "S1", &fp).unwrap();

        let manager = SessionManager::new(SessionStore::new(dir.path()), true);
        let sandbox = Arc::new(FakeSandbox::new());
        let session = manager
            .acquire(
                &"agent-a".to_string(),
                &cfg,
                sandbox.clone(),
                ToolRegistry::new(),
                SandboxRequest::Cached,
            )
            .await
            .unwrap();

        assert_eq!(session.sandbox.sandbox_id(), Some("S1".to_string()));
        let record = store.load(&"agent-a".to_string()).unwrap().unwrap();
        assert_eq!(record.sandbox_id, "S1");
    }

    #[tokio::test]
    async fn s2_fingerprint_drift_creates_new_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let old_cfg = config();
        store
            .save(&"agent-a".to_string(), "S1", &fingerprint(&old_cfg))
            .unwrap();

        let manager = SessionManager::new(SessionStore::new(dir.path()), true);
        let new_cfg = config_with_server("fs");
        let sandbox = Arc::new(FakeSandbox::new());
        let session = manager
            .acquire(
                &"agent-a".to_string(),
                &new_cfg,
                sandbox.clone(),
                ToolRegistry::new(),
                SandboxRequest::Cached,
            )
            .await
            .unwrap();

        assert_eq!(session.sandbox.sandbox_id(), Some("fake-sandbox".to_string()));
        let record = store.load(&"agent-a".to_string()).unwrap().unwrap();
        assert_eq!(record.config_hash, fingerprint(&new_cfg).as_str());
    }

    #[tokio::test]
    async fn s3_reattach_failure_falls_back_to_fresh_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let cfg = config();
        store.save(&"agent-a".to_string(), "S1", &fingerprint(&cfg)).unwrap();

        let manager = SessionManager::new(SessionStore::new(dir.path()), true);
        let sandbox = Arc::new(FakeSandbox::new());
        sandbox.inject_fault_once("sandbox disconnect");
        let session = manager
            .acquire(
                &"agent-a".to_string(),
                &cfg,
                sandbox.clone(),
                ToolRegistry::new(),
                SandboxRequest::Cached,
            )
            .await
            .unwrap();

        assert_eq!(session.sandbox.sandbox_id(), Some("fake-sandbox".to_string()));
        assert!(store.load(&"agent-a".to_string()).unwrap().is_some());
    }

    #[tokio::test]
    async fn fresh_sandbox_request_discards_cached_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let cfg = config();
        store.save(&"agent-a".to_string(), "S1", &fingerprint(&cfg)).unwrap();

        let manager = SessionManager::new(SessionStore::new(dir.path()), true);
        let sandbox = Arc::new(FakeSandbox::new());
        manager
            .acquire(
                &"agent-a".to_string(),
                &cfg,
                sandbox.clone(),
                ToolRegistry::new(),
                SandboxRequest::Fresh,
            )
            .await
            .unwrap();

        let record = store.load(&"agent-a".to_string()).unwrap().unwrap();
        assert_ne!(record.sandbox_id, "S1");
    }
}
