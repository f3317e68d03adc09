//! The model runtime contract (C6.3, `spec.md` §6.3) — opaque by design.
//! The wire protocol on the other side of [`ModelRuntime`] is out of scope
//! (`spec.md` §1); this module only fixes the shape the executor consumes:
//! a dual-mode stream (`messages`, `updates`) and a resume primitive.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::chunk::ChunkFragment;
use crate::tools::{ToolContext, ToolRegistry, dispatch_tool_call};

#[derive(Debug, Error)]
pub enum ModelStreamError {
    #[error("model stream error: {0}")]
    Other(String),
}

/// One event on the `messages` channel: incremental model tokens, a
/// tool-call fragment tagged with position metadata, or the result of a
/// tool call the runtime's bound graph already executed (`spec.md` §4.5:
/// tool invocation happens inside the model runtime; the executor only
/// observes and renders results).
#[derive(Debug, Clone)]
pub enum MessageEvent {
    Text(String),
    ToolCallFragment(ChunkFragment),
    ToolResult { name: String, content: String },
}

/// One entry of an `__interrupt__` update: a human-in-the-loop request
/// carrying an opaque action-requests payload.
#[derive(Debug, Clone)]
pub struct Interrupt {
    pub id: String,
    pub value: Value,
}

/// One event on the `updates` channel: a state delta keyed by node name, or
/// a HITL interrupt.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    StateDelta { node: String, value: Value },
    Interrupt(Vec<Interrupt>),
}

/// The two streams returned by `stream`/`resume`.
pub struct StreamHandles {
    pub messages: ReceiverStream<MessageEvent>,
    pub updates: ReceiverStream<UpdateEvent>,
}

/// Input seeding a fresh stream: the (already mention-expanded) prompt text
/// plus optional extra system-reminder messages (plan-mode injection, HITL
/// resume reminders carried as ordinary user-role messages).
#[derive(Debug, Clone, Default)]
pub struct ModelInput {
    pub prompt: String,
    pub system_reminders: Vec<String>,
}

/// A response to one or more pending interrupts, keyed by interrupt id.
#[derive(Debug, Clone, Default)]
pub struct ResumeCommand {
    pub decisions: Value,
    /// An optional replacement message list appended before resuming.
    pub update: Option<Vec<String>>,
}

/// The opaque model runtime contract: a streaming invocation and a resume
/// primitive (`spec.md` §6.3).
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    async fn stream(&self, input: ModelInput) -> Result<StreamHandles, ModelStreamError>;
    async fn resume(&self, command: ResumeCommand) -> Result<StreamHandles, ModelStreamError>;
}

/// A scripted [`ModelRuntime`] test double: each call to `stream`/`resume`
/// pops the next queued script, replaying its events onto fresh channels.
/// Used by the `cli` crate's executor tests to drive the HITL and
/// fault-recovery scenarios from `spec.md` §8 without a live model backend.
pub struct FakeModelRuntime {
    scripts: std::sync::Mutex<std::collections::VecDeque<Vec<ScriptedEvent>>>,
    tools: Option<(Arc<ToolRegistry>, Arc<dyn ToolContext>)>,
    /// The most recent [`ResumeCommand`] passed to `resume`, for tests that
    /// assert on the decisions/update shape the executor built.
    last_resume: std::sync::Mutex<Option<ResumeCommand>>,
}

#[derive(Debug, Clone)]
pub enum ScriptedEvent {
    Message(MessageEvent),
    Update(UpdateEvent),
    /// A tool call the runtime dispatches itself, mirroring how a live model
    /// runtime invokes tools internally and only hands the executor the
    /// resulting text (`spec.md` §4.5 Phase 2). Requires [`with_tools`] —
    /// without a bound registry it plays back as an `ERROR:` result.
    ToolCall { name: String, args: Value },
}

impl FakeModelRuntime {
    pub fn new(scripts: Vec<Vec<ScriptedEvent>>) -> Self {
        Self {
            scripts: std::sync::Mutex::new(scripts.into()),
            tools: None,
            last_resume: std::sync::Mutex::new(None),
        }
    }

    /// The [`ResumeCommand`] passed to the most recent `resume` call, if any.
    pub fn last_resume(&self) -> Option<ResumeCommand> {
        self.last_resume.lock().expect("fake model runtime lock poisoned").clone()
    }

    /// Bind a [`ToolRegistry`]/[`ToolContext`] pair so scripted
    /// [`ScriptedEvent::ToolCall`] events actually dispatch through the
    /// uniform tool adapter instead of erroring.
    pub fn with_tools(mut self, registry: Arc<ToolRegistry>, context: Arc<dyn ToolContext>) -> Self {
        self.tools = Some((registry, context));
        self
    }

    fn next_script(&self) -> Vec<ScriptedEvent> {
        self.scripts
            .lock()
            .expect("fake model runtime lock poisoned")
            .pop_front()
            .unwrap_or_default()
    }

    async fn play(&self, events: Vec<ScriptedEvent>) -> StreamHandles {
        let (msg_tx, msg_rx) = mpsc::channel(64);
        let (upd_tx, upd_rx) = mpsc::channel(64);
        for event in events {
            match event {
                ScriptedEvent::Message(m) => {
                    let _ = msg_tx.send(m).await;
                }
                ScriptedEvent::Update(u) => {
                    let _ = upd_tx.send(u).await;
                }
                ScriptedEvent::ToolCall { name, args } => {
                    let content = match &self.tools {
                        Some((registry, context)) => {
                            dispatch_tool_call(registry, context.as_ref(), &name, args).await
                        }
                        None => format!("ERROR: no tool registry bound for {name}"),
                    };
                    let _ = msg_tx.send(MessageEvent::ToolResult { name, content }).await;
                }
            }
        }
        StreamHandles {
            messages: ReceiverStream::new(msg_rx),
            updates: ReceiverStream::new(upd_rx),
        }
    }
}

#[async_trait]
impl ModelRuntime for FakeModelRuntime {
    async fn stream(&self, _input: ModelInput) -> Result<StreamHandles, ModelStreamError> {
        Ok(self.play(self.next_script()).await)
    }

    async fn resume(&self, command: ResumeCommand) -> Result<StreamHandles, ModelStreamError> {
        *self.last_resume.lock().expect("fake model runtime lock poisoned") = Some(command);
        Ok(self.play(self.next_script()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentToolContext, ReadFileTool};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn fake_model_runtime_replays_scripted_text() {
        let runtime = FakeModelRuntime::new(vec![vec![ScriptedEvent::Message(MessageEvent::Text(
            "hello".to_string(),
        ))]]);
        let mut handles = runtime.stream(ModelInput::default()).await.unwrap();
        match handles.messages.next().await {
            Some(MessageEvent::Text(text)) => assert_eq!(text, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_call_without_bound_registry_errors() {
        let runtime = FakeModelRuntime::new(vec![vec![ScriptedEvent::ToolCall {
            name: "read_file".to_string(),
            args: serde_json::json!({ "path": "a.txt" }),
        }]]);
        let mut handles = runtime.stream(ModelInput::default()).await.unwrap();
        match handles.messages.next().await {
            Some(MessageEvent::ToolResult { content, .. }) => {
                assert!(content.starts_with("ERROR: no tool registry bound"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_call_with_bound_registry_dispatches_through_the_tool() {
        let sandbox = Arc::new(vessel_sandbox::FakeSandbox::new());
        sandbox.seed_file("a.txt", "hello");
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(ReadFileTool::new()));
        let context: Arc<dyn ToolContext> = Arc::new(AgentToolContext::basic("s1", sandbox));

        let runtime = FakeModelRuntime::new(vec![vec![ScriptedEvent::ToolCall {
            name: "read_file".to_string(),
            args: serde_json::json!({ "path": "a.txt" }),
        }]])
        .with_tools(Arc::new(registry), context);

        let mut handles = runtime.stream(ModelInput::default()).await.unwrap();
        match handles.messages.next().await {
            Some(MessageEvent::ToolResult { name, content }) => {
                assert_eq!(name, "read_file");
                assert!(content.contains("hello"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
