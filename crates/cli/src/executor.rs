//! Streaming executor (C6) — `spec.md` §4.5, Phases 0-5.

use tokio_stream::StreamExt;

use vessel_agent::{
    ChunkFragment, CliConfig, ModelInput, ModelRuntime, ResumeCommand, Session, SessionManager,
    ToolCallChunkBuffer,
};
use vessel_agent::model::{MessageEvent, UpdateEvent};

use crate::fault::{self, FaultDetector, FaultSignal};
use crate::ui;

/// Per-turn mutable state (`spec.md` §4.5): the pending-text buffer, the
/// active spinner, whether any text has been emitted yet, the assembling
/// tool-call buffer, and the counters the fault detector needs.
pub struct TurnState {
    pub pending_text: String,
    pub spinner: Option<ui::TurnSpinner>,
    pub has_responded: bool,
    pub chunk_buffer: ToolCallChunkBuffer,
    pub captured_tokens: u64,
    pub fault: FaultDetector,
}

impl TurnState {
    pub fn new() -> Self {
        Self {
            pending_text: String::new(),
            spinner: Some(ui::TurnSpinner::start("thinking")),
            has_responded: false,
            chunk_buffer: ToolCallChunkBuffer::new(),
            captured_tokens: 0,
            fault: FaultDetector::new(),
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(mut spinner) = self.spinner.take() {
            spinner.stop();
        }
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    FaultUnrecovered,
    /// Internal: a confirmed fault was reattached successfully and the turn
    /// must restart from Phase 0 with the original prompt (`spec.md` §4.6
    /// step 2). Never returned by [`StreamingExecutor::run_turn`] — its
    /// retry loop consumes this variant before returning.
    Retry,
}

/// Drives one user turn against a bound [`ModelRuntime`]: preprocessing
/// (mention expansion, done by the caller before building [`ModelInput`]),
/// the stream loop, HITL resolution, and one-shot fault recovery.
pub struct StreamingExecutor<'a> {
    pub runtime: &'a dyn ModelRuntime,
    pub session: &'a Session,
    pub manager: &'a SessionManager,
    pub config: &'a CliConfig,
    pub plan_mode: bool,
    pub auto_approve: bool,
}

impl<'a> StreamingExecutor<'a> {
    /// Runs a turn to completion, retrying exactly once from Phase 0 with
    /// the original `prompt` if a fault is recovered mid-turn
    /// (`spec.md` §4.6).
    pub async fn run_turn(&self, prompt: String) -> TurnOutcome {
        let mut retry_used = false;
        loop {
            let mut state = TurnState::new();
            state.fault.retry_used = retry_used;

            let mut input = ModelInput {
                prompt: prompt.clone(),
                system_reminders: Vec::new(),
            };
            if self.plan_mode {
                input.system_reminders.push(
                    "Plan mode is active: propose a plan and wait for approval before using any \
                     write-capable tool."
                        .to_string(),
                );
            }

            let handles = match self.runtime.stream(input).await {
                Ok(h) => h,
                Err(e) => {
                    state.stop_spinner();
                    ui::print_assistant_error(&format!("model stream failed to start: {e}"));
                    return TurnOutcome::FaultUnrecovered;
                }
            };

            let outcome = self
                .drive(handles.messages, handles.updates, &mut state)
                .await;
            match outcome {
                TurnOutcome::Retry => {
                    retry_used = true;
                    continue;
                }
                other => return other,
            }
        }
    }

    async fn drive(
        &self,
        mut messages: tokio_stream::wrappers::ReceiverStream<MessageEvent>,
        mut updates: tokio_stream::wrappers::ReceiverStream<UpdateEvent>,
        state: &mut TurnState,
    ) -> TurnOutcome {
        loop {
            tokio::select! {
                msg = messages.next() => {
                    match msg {
                        Some(event) => {
                            if let Some(outcome) = self.handle_message(event, state).await {
                                return outcome;
                            }
                        }
                        None => break,
                    }
                }
                upd = updates.next() => {
                    match upd {
                        Some(event) => {
                            if let Some(outcome) = self.handle_update(event, state).await {
                                return outcome;
                            }
                        }
                        None => continue,
                    }
                }
                else => break,
            }
        }

        state.stop_spinner();
        ui::flush_text(&mut state.pending_text);
        TurnOutcome::Completed
    }

    async fn handle_message(&self, event: MessageEvent, state: &mut TurnState) -> Option<TurnOutcome> {
        match event {
            MessageEvent::Text(text) => {
                if !state.has_responded {
                    state.stop_spinner();
                    state.has_responded = true;
                }
                state.pending_text.push_str(&text);
                if state.pending_text.len() > 512 {
                    ui::flush_text(&mut state.pending_text);
                }
                state.captured_tokens += text.split_whitespace().count() as u64;
                None
            }
            MessageEvent::ToolCallFragment(fragment) => {
                self.handle_fragment(fragment, state);
                None
            }
            MessageEvent::ToolResult { name, content } => {
                ui::flush_text(&mut state.pending_text);
                let signal = state.fault.observe_text_result(&name, true, &content);
                if signal == FaultSignal::Fault {
                    return self.attempt_recovery(state).await;
                }
                if state.fault.empty_streak_exceeded() {
                    if fault::liveness_probe(self.session.sandbox.as_ref()).await {
                        state.fault.reset_empty_streak();
                    } else {
                        return self.attempt_recovery(state).await;
                    }
                }
                None
            }
        }
    }

    fn handle_fragment(&self, fragment: ChunkFragment, state: &mut TurnState) {
        if let Some(call) = state.chunk_buffer.feed(fragment) {
            ui::flush_text(&mut state.pending_text);
            state.stop_spinner();
            ui::print_tool_call_line(&call.name, &call.raw_args);
            state.spinner = Some(ui::TurnSpinner::start("working"));
        }
    }

    async fn handle_update(&self, event: UpdateEvent, state: &mut TurnState) -> Option<TurnOutcome> {
        match event {
            UpdateEvent::StateDelta { node, value } => {
                if node == "todo" {
                    if let Some(items) = value.as_array() {
                        let rows: Vec<(String, bool)> = items
                            .iter()
                            .filter_map(|v| {
                                let text = v.get("text")?.as_str()?.to_string();
                                let done = v.get("done").and_then(|d| d.as_bool()).unwrap_or(false);
                                Some((text, done))
                            })
                            .collect();
                        ui::flush_text(&mut state.pending_text);
                        ui::print_todo_panel(&rows);
                    }
                }
                None
            }
            UpdateEvent::Interrupt(interrupts) => {
                ui::flush_text(&mut state.pending_text);
                state.stop_spinner();
                self.resolve_interrupts(interrupts, state).await
            }
        }
    }

    /// Phase 3: resolve every pending interrupt via the HITL panel (or
    /// auto-approve), then resume the stream with the accumulated
    /// `{decisions: [...]}` map and a system-reminder message carried in
    /// `update` — feedback verbatim + "revise" on any rejection, "proceed"
    /// on full approval (`spec.md` §4.5 Phase 3, scenarios S5/S6).
    async fn resolve_interrupts(
        &self,
        interrupts: Vec<vessel_agent::model::Interrupt>,
        state: &mut TurnState,
    ) -> Option<TurnOutcome> {
        let mut decisions = serde_json::Map::new();
        let mut rejection_feedback = Vec::new();

        for interrupt in &interrupts {
            let choice = if self.auto_approve {
                ui::HitlChoice::Accept
            } else {
                let description = interrupt
                    .value
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("The agent is requesting approval to proceed.");
                ui::render_hitl_panel("Approval requested", description)
            };
            let decision_type = match &choice {
                ui::HitlChoice::Accept => "approve",
                ui::HitlChoice::Reject(feedback) => {
                    rejection_feedback.push(feedback.clone());
                    "reject"
                }
            };
            decisions.insert(
                interrupt.id.clone(),
                serde_json::json!({ "decisions": [{ "type": decision_type }] }),
            );
        }

        let reminder = if rejection_feedback.is_empty() {
            "The requested action was approved. Proceed.".to_string()
        } else {
            format!(
                "The requested action was rejected with the following feedback:\n{}\n\
                 Revise your approach accordingly.",
                rejection_feedback.join("\n")
            )
        };

        let command = ResumeCommand {
            decisions: serde_json::Value::Object(decisions),
            update: Some(vec![reminder]),
        };
        match self.runtime.resume(command).await {
            Ok(handles) => {
                let outcome = Box::pin(self.drive(handles.messages, handles.updates, state)).await;
                Some(outcome)
            }
            Err(e) => {
                ui::print_assistant_error(&format!("failed to resume after approval: {e}"));
                Some(TurnOutcome::FaultUnrecovered)
            }
        }
    }

    /// One-shot-per-turn fault recovery (`spec.md` §4.6): reattach with the
    /// same sandbox id, or fall back to a fresh sandbox, then re-enter
    /// Phase 0 with the original prompt if recovery succeeds. Never
    /// retries more than once per turn.
    async fn attempt_recovery(&self, state: &mut TurnState) -> Option<TurnOutcome> {
        if state.fault.retry_used {
            ui::print_tool_fault("sandbox fault persisted after one recovery attempt");
            return Some(TurnOutcome::FaultUnrecovered);
        }
        state.stop_spinner();
        ui::print_recovery_notice("sandbox fault detected, attempting recovery...");

        match fault::reattach_or_recreate(
            self.manager,
            &self.session.agent_name,
            self.config,
            self.session.sandbox.clone(),
            self.session.tool_registry.clone(),
        )
        .await
        {
            Ok(_) => {
                ui::print_success("sandbox recovered, retrying the turn");
                Some(TurnOutcome::Retry)
            }
            Err(e) => {
                ui::print_tool_fault(&format!("sandbox recovery failed: {e}"));
                Some(TurnOutcome::FaultUnrecovered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vessel_agent::model::{FakeModelRuntime, ScriptedEvent};
    use vessel_agent::{CliConfig, SessionManager, SessionStore, ToolRegistry};
    use vessel_sandbox::FakeSandbox;

    fn session() -> Session {
        Session {
            sandbox: Arc::new(FakeSandbox::new()),
            tool_registry: ToolRegistry::new(),
            agent_name: "agent-a".to_string(),
        }
    }

    fn manager() -> SessionManager {
        let dir = tempfile::tempdir().expect("tempdir");
        SessionManager::new(SessionStore::new(dir.path()), false)
    }

    #[tokio::test]
    async fn plain_text_turn_completes() {
        let runtime = FakeModelRuntime::new(vec![vec![ScriptedEvent::Message(MessageEvent::Text(
            "hello there".to_string(),
        ))]]);
        let session = session();
        let manager = manager();
        let config = CliConfig::default();
        let executor = StreamingExecutor {
            runtime: &runtime,
            session: &session,
            manager: &manager,
            config: &config,
            plan_mode: false,
            auto_approve: true,
        };
        let outcome = executor.run_turn("hi".to_string()).await;
        assert_eq!(outcome, TurnOutcome::Completed);
    }

    #[tokio::test]
    async fn tool_result_fault_text_triggers_one_recovery_then_aborts_on_the_next() {
        let fault_turn = || {
            vec![ScriptedEvent::Message(MessageEvent::ToolResult {
                name: "shell".to_string(),
                content: "error: connection refused".to_string(),
            })]
        };
        let runtime = FakeModelRuntime::new(vec![fault_turn(), fault_turn()]);
        let session = session();
        let manager = manager();
        let config = CliConfig::default();
        let executor = StreamingExecutor {
            runtime: &runtime,
            session: &session,
            manager: &manager,
            config: &config,
            plan_mode: false,
            auto_approve: true,
        };
        let outcome = executor.run_turn("run it".to_string()).await;
        assert_eq!(outcome, TurnOutcome::FaultUnrecovered);
    }

    #[tokio::test]
    async fn plan_approved_resumes_with_approve_decision_and_proceed_reminder() {
        let runtime = FakeModelRuntime::new(vec![
            vec![ScriptedEvent::Update(UpdateEvent::Interrupt(vec![
                vessel_agent::model::Interrupt {
                    id: "plan-1".to_string(),
                    value: serde_json::json!({"description": "submit_plan"}),
                },
            ]))],
            vec![ScriptedEvent::Message(MessageEvent::Text(
                "done".to_string(),
            ))],
        ]);
        let session = session();
        let manager = manager();
        let config = CliConfig::default();
        let executor = StreamingExecutor {
            runtime: &runtime,
            session: &session,
            manager: &manager,
            config: &config,
            plan_mode: true,
            auto_approve: true,
        };
        let outcome = executor.run_turn("write it".to_string()).await;
        assert_eq!(outcome, TurnOutcome::Completed);

        let resume = runtime.last_resume().expect("resume should have been called");
        assert_eq!(
            resume.decisions,
            serde_json::json!({"plan-1": {"decisions": [{"type": "approve"}]}})
        );
        assert_eq!(resume.update, Some(vec!["The requested action was approved. Proceed.".to_string()]));
    }

    #[tokio::test]
    async fn interrupt_auto_approves_and_resumes_to_completion() {
        let runtime = FakeModelRuntime::new(vec![
            vec![ScriptedEvent::Update(UpdateEvent::Interrupt(vec![
                vessel_agent::model::Interrupt {
                    id: "i1".to_string(),
                    value: serde_json::json!({"description": "write main.rs?"}),
                },
            ]))],
            vec![ScriptedEvent::Message(MessageEvent::Text(
                "done".to_string(),
            ))],
        ]);
        let session = session();
        let manager = manager();
        let config = CliConfig::default();
        let executor = StreamingExecutor {
            runtime: &runtime,
            session: &session,
            manager: &manager,
            config: &config,
            plan_mode: false,
            auto_approve: true,
        };
        let outcome = executor.run_turn("write it".to_string()).await;
        assert_eq!(outcome, TurnOutcome::Completed);
    }
}
