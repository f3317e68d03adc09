//! Session/execution core: the C2-C5 components of `spec.md` §2 — tool
//! dispatch, tool-call chunk assembly, the opaque model-runtime contract,
//! and sandbox session persistence/lifecycle. The `cli` crate owns the
//! streaming executor, fault detector, and everything user-facing
//! (`spec.md` §2, C6-C10).

pub mod chunk;
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod tools;

pub use chunk::{ChunkFragment, CompletedToolCall, ToolCallChunkBuffer};
pub use config::{
    AgentIdentity, AgentMemory, CliConfig, ConfigFingerprint, ToolServerDescriptor, TransportKind,
    fingerprint,
};
pub use error::AgentError;
pub use model::{
    FakeModelRuntime, Interrupt, MessageEvent, ModelInput, ModelRuntime, ModelStreamError,
    ResumeCommand, ScriptedEvent, StreamHandles, UpdateEvent,
};
pub use session::{MAX_SESSION_AGE, PersistedSession, SandboxRequest, Session, SessionManager, SessionStore, StoreError};
pub use tools::{
    AgentToolContext, CapabilityRequirement, Tool, ToolContext, ToolDefinition, ToolError,
    ToolRegistry, all_builtin_tools, dispatch_tool_call,
};
