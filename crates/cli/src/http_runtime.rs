//! Reference HTTP-backed [`ModelRuntime`] (`spec.md` §6.3 / `SPEC_FULL.md`
//! §1): the wire protocol is an opaque vendor detail, modeled here as
//! newline-delimited JSON events POSTed back as a chunked HTTP response —
//! "JSON request in, JSON events out" is all this crate assumes, mirroring
//! how `HttpSandbox` treats its own vendor boundary.
//!
//! Tool invocation happens inside the model runtime (`spec.md` §4.5 Phase 2):
//! this runtime owns a bound [`ToolRegistry`]/[`ToolContext`] pair and
//! dispatches every completed tool call itself through the uniform `ERROR:`
//! adapter (C2), reporting the result back to the backend so its own graph
//! state stays in sync. A `ToolResult` arriving directly on the wire is
//! still relayed as-is — tool servers discovered dynamically at session
//! start (`spec.md` §2) may run on the backend side of this boundary, outside
//! this runtime's local registry.

use async_trait::async_trait;
use futures_util::StreamExt as _;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use vessel_agent::model::{
    Interrupt, MessageEvent, ModelInput, ModelRuntime, ModelStreamError, ResumeCommand,
    StreamHandles, UpdateEvent,
};
use vessel_agent::{ChunkFragment, ToolCallChunkBuffer, ToolContext, ToolRegistry, dispatch_tool_call};

pub struct HttpModelRuntime {
    base_url: String,
    http: reqwest::Client,
    tools: Arc<ToolRegistry>,
    context: Arc<dyn ToolContext>,
}

impl HttpModelRuntime {
    pub fn new(base_url: impl Into<String>, tools: Arc<ToolRegistry>, context: Arc<dyn ToolContext>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            tools,
            context,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn open(&self, path: &str, body: serde_json::Value) -> Result<StreamHandles, ModelStreamError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelStreamError::Other(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelStreamError::Other(text));
        }

        let (msg_tx, msg_rx) = mpsc::channel(64);
        let (upd_tx, upd_rx) = mpsc::channel(64);

        let tools = self.tools.clone();
        let context = self.context.clone();
        let http = self.http.clone();
        let base_url = self.base_url.clone();

        tokio::spawn(async move {
            let mut chunk_buffer = ToolCallChunkBuffer::new();
            let mut bytes_stream = response.bytes_stream();
            let mut carry = String::new();
            while let Some(chunk) = bytes_stream.next().await {
                let Ok(chunk) = chunk else { break };
                carry.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = carry.find('\n') {
                    let line = carry[..pos].trim().to_string();
                    carry.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    dispatch_line(&line, &msg_tx, &upd_tx, &mut chunk_buffer, &tools, context.as_ref(), &http, &base_url).await;
                }
            }
            if !carry.trim().is_empty() {
                let line = carry.trim().to_string();
                dispatch_line(&line, &msg_tx, &upd_tx, &mut chunk_buffer, &tools, context.as_ref(), &http, &base_url).await;
            }
        });

        Ok(StreamHandles {
            messages: ReceiverStream::new(msg_rx),
            updates: ReceiverStream::new(upd_rx),
        })
    }
}

/// One line of the wire protocol: tagged by `type`.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Text { content: String },
    ToolCallFragment {
        chunk_id: String,
        name: Option<String>,
        args_piece: Option<String>,
        #[serde(default)]
        end_of_call: bool,
        chunk_position: Option<String>,
    },
    ToolResult { name: String, content: String },
    StateDelta { node: String, value: serde_json::Value },
    Interrupt { interrupts: Vec<WireInterrupt> },
}

#[derive(Deserialize)]
struct WireInterrupt {
    id: String,
    value: serde_json::Value,
}

/// POST a locally-dispatched tool's result back to the backend so its graph
/// state (the conversation the model actually continues from) stays in
/// sync with what the user saw. Best-effort: a failed report does not fail
/// the turn, since the result has already been surfaced to the user.
async fn report_tool_result(http: &reqwest::Client, base_url: &str, name: &str, content: &str) {
    let endpoint = format!("{}/tool_result", base_url.trim_end_matches('/'));
    let _ = http
        .post(endpoint)
        .json(&json!({ "name": name, "content": content }))
        .send()
        .await;
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_line(
    line: &str,
    msg_tx: &mpsc::Sender<MessageEvent>,
    upd_tx: &mpsc::Sender<UpdateEvent>,
    chunk_buffer: &mut ToolCallChunkBuffer,
    tools: &ToolRegistry,
    context: &dyn ToolContext,
    http: &reqwest::Client,
    base_url: &str,
) {
    let Ok(event) = serde_json::from_str::<WireEvent>(line) else {
        return;
    };
    match event {
        WireEvent::Text { content } => {
            let _ = msg_tx.send(MessageEvent::Text(content)).await;
        }
        WireEvent::ToolCallFragment {
            chunk_id,
            name,
            args_piece,
            end_of_call,
            chunk_position,
        } => {
            let fragment = ChunkFragment {
                chunk_id,
                name,
                args_piece,
                end_of_call,
                chunk_position,
            };
            let completed = chunk_buffer.feed(fragment.clone());
            let _ = msg_tx.send(MessageEvent::ToolCallFragment(fragment)).await;

            if let Some(call) = completed {
                if tools.find(&call.name).is_some() {
                    let content = dispatch_tool_call(tools, context, &call.name, call.args).await;
                    report_tool_result(http, base_url, &call.name, &content).await;
                    let _ = msg_tx
                        .send(MessageEvent::ToolResult { name: call.name, content })
                        .await;
                }
            }
        }
        WireEvent::ToolResult { name, content } => {
            let _ = msg_tx.send(MessageEvent::ToolResult { name, content }).await;
        }
        WireEvent::StateDelta { node, value } => {
            let _ = upd_tx.send(UpdateEvent::StateDelta { node, value }).await;
        }
        WireEvent::Interrupt { interrupts } => {
            let interrupts = interrupts
                .into_iter()
                .map(|i| Interrupt {
                    id: i.id,
                    value: i.value,
                })
                .collect();
            let _ = upd_tx.send(UpdateEvent::Interrupt(interrupts)).await;
        }
    }
}

#[async_trait]
impl ModelRuntime for HttpModelRuntime {
    async fn stream(&self, input: ModelInput) -> Result<StreamHandles, ModelStreamError> {
        self.open(
            "stream",
            json!({
                "prompt": input.prompt,
                "system_reminders": input.system_reminders,
            }),
        )
        .await
    }

    async fn resume(&self, command: ResumeCommand) -> Result<StreamHandles, ModelStreamError> {
        self.open(
            "resume",
            json!({
                "decisions": command.decisions,
                "update": command.update,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_agent::AgentToolContext;
    use vessel_sandbox::FakeSandbox;

    fn runtime(base_url: &str) -> HttpModelRuntime {
        let context: Arc<dyn ToolContext> = Arc::new(AgentToolContext::basic("test", Arc::new(FakeSandbox::new())));
        HttpModelRuntime::new(base_url, Arc::new(ToolRegistry::new()), context)
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let runtime = runtime("http://localhost:9999/");
        assert_eq!(runtime.endpoint("stream"), "http://localhost:9999/stream");
    }

    #[test]
    fn wire_text_event_parses() {
        let line = r#"{"type":"text","content":"hi"}"#;
        let event: WireEvent = serde_json::from_str(line).unwrap();
        assert!(matches!(event, WireEvent::Text { .. }));
    }
}
