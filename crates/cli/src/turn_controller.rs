//! Turn controller (C10) — `spec.md` §4.10, the outer read-eval loop.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use reedline::{Prompt, PromptHistorySearch, Reedline, Signal};

use vessel_agent::{CliConfig, Session, SessionManager};

use crate::commands::{self, SlashCommand};
use crate::executor::{StreamingExecutor, TurnOutcome};
use crate::input;
use crate::ui;

/// Window within which a second exit keystroke confirms quitting
/// (`SPEC_FULL.md` §4.10 ADDED).
const EXIT_CONFIRM_WINDOW: Duration = Duration::from_secs(3);

const QUIT_KEYWORDS: [&str; 2] = ["exit", "quit"];

struct VesselPrompt {
    prompt_text: String,
}

impl VesselPrompt {
    fn new(agent: &str) -> Self {
        Self {
            prompt_text: format!("{agent} :: "),
        }
    }
}

impl Prompt for VesselPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed(&self.prompt_text)
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        match history_search.status {
            reedline::PromptHistorySearchStatus::Passing => Cow::Borrowed("(search) "),
            reedline::PromptHistorySearchStatus::Failing => Cow::Borrowed("(failing search) "),
        }
    }
}

/// Classification of one line of raw input (`spec.md` §4.10).
enum Classified {
    Slash(SlashCommand),
    BashEscape(String),
    Quit,
    Prompt(String),
}

fn classify(line: &str) -> Classified {
    let trimmed = line.trim();
    if let Some(cmd) = commands::parse(trimmed) {
        return Classified::Slash(cmd);
    }
    if let Some(rest) = trimmed.strip_prefix('!') {
        return Classified::BashEscape(rest.to_string());
    }
    if QUIT_KEYWORDS.contains(&trimmed.to_lowercase().as_str()) {
        return Classified::Quit;
    }
    Classified::Prompt(line.to_string())
}

pub struct TurnController<'a> {
    pub session: &'a Session,
    pub manager: &'a SessionManager,
    pub config: &'a CliConfig,
    pub plan_mode: bool,
    pub auto_approve: bool,
}

impl<'a> TurnController<'a> {
    /// Run the interactive loop until the user quits. `runtime` is bound to
    /// the session at setup and never rebuilt mid-loop (`spec.md` §4.5
    /// Phase 2: the model runtime owns tool dispatch for the life of the
    /// session).
    pub async fn run(&self, runtime: &dyn vessel_agent::ModelRuntime) {
        let mut line_editor = Reedline::create();
        let prompt = VesselPrompt::new(&self.session.agent_name);

        let mut has_active_conversation = false;
        let mut last_quit_keystroke: Option<Instant> = None;

        loop {
            let signal = match line_editor.read_line(&prompt) {
                Ok(signal) => signal,
                Err(e) => {
                    ui::print_assistant_error(&format!("input error: {e}"));
                    break;
                }
            };

            let line = match signal {
                Signal::Success(line) => line,
                Signal::CtrlD | Signal::CtrlC => {
                    if self.confirm_exit(&mut last_quit_keystroke) {
                        break;
                    }
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match classify(&line) {
                Classified::Quit => {
                    if self.confirm_exit(&mut last_quit_keystroke) {
                        break;
                    }
                }
                Classified::Slash(SlashCommand::Exit) => {
                    break;
                }
                Classified::Slash(cmd) => {
                    self.run_slash(cmd, &mut has_active_conversation).await;
                }
                Classified::BashEscape(cmd) => {
                    self.run_bash_escape(&cmd).await;
                }
                Classified::Prompt(text) => {
                    let expanded = input::expand_mentions(&text, self.session.sandbox.as_ref()).await;
                    let executor = StreamingExecutor {
                        runtime,
                        session: self.session,
                        manager: self.manager,
                        config: self.config,
                        plan_mode: self.plan_mode,
                        auto_approve: self.auto_approve,
                    };
                    has_active_conversation = true;
                    match executor.run_turn(expanded).await {
                        TurnOutcome::Completed => {}
                        TurnOutcome::Cancelled => ui::print_info("turn cancelled"),
                        TurnOutcome::FaultUnrecovered => {
                            ui::print_tool_fault("this turn did not complete; try again")
                        }
                    }
                }
            }
        }
    }

    /// Requires a second quit signal within [`EXIT_CONFIRM_WINDOW`] to
    /// actually exit (`SPEC_FULL.md` §4.10 ADDED).
    fn confirm_exit(&self, last: &mut Option<Instant>) -> bool {
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) <= EXIT_CONFIRM_WINDOW => true,
            _ => {
                ui::print_info("press again within 3s to exit");
                *last = Some(now);
                false
            }
        }
    }

    async fn run_slash(&self, cmd: SlashCommand, has_active_conversation: &mut bool) {
        let sandbox = self.session.sandbox.as_ref();
        match cmd {
            SlashCommand::Help => commands::print_help(),
            SlashCommand::Clear => {
                commands::run_clear(sandbox, "/home/agent/.vessel-scratch").await;
                *has_active_conversation = false;
            }
            SlashCommand::Tokens => commands::run_tokens(0),
            SlashCommand::Files { all } => commands::run_files(sandbox, all).await,
            SlashCommand::View { path } => commands::run_view(sandbox, &path).await,
            SlashCommand::Copy { path } => commands::run_copy(sandbox, &path).await,
            SlashCommand::Download { path, local } => {
                commands::run_download(sandbox, &path, local.as_deref()).await
            }
            SlashCommand::Model => {
                commands::run_model(*has_active_conversation);
            }
            SlashCommand::Exit => {}
            SlashCommand::Unknown(name) => {
                ui::print_assistant_error(&format!("unknown command: /{name}"));
            }
        }
    }

    /// `!cmd`: a bash escape capped at 60s, never reaching the model
    /// (`spec.md` §4.10).
    async fn run_bash_escape(&self, cmd: &str) {
        match self
            .session
            .sandbox
            .execute_bash(cmd, None, Duration::from_secs(60), false)
            .await
        {
            Ok(result) => {
                if !result.stdout.is_empty() {
                    print!("{}", result.stdout);
                }
                if !result.stderr.is_empty() {
                    eprint!("{}", result.stderr);
                }
            }
            Err(e) => ui::print_assistant_error(&format!("bash escape failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_slash_commands() {
        assert!(matches!(
            classify("/help"),
            Classified::Slash(SlashCommand::Help)
        ));
    }

    #[test]
    fn classifies_bash_escape() {
        match classify("!ls -la") {
            Classified::BashEscape(cmd) => assert_eq!(cmd, "ls -la"),
            _ => panic!("expected bash escape"),
        }
    }

    #[test]
    fn classifies_quit_keywords_case_insensitively() {
        assert!(matches!(classify("Exit"), Classified::Quit));
        assert!(matches!(classify("QUIT"), Classified::Quit));
    }

    #[test]
    fn classifies_plain_text_as_prompt() {
        match classify("summarize this repo") {
            Classified::Prompt(text) => assert_eq!(text, "summarize this repo"),
            _ => panic!("expected prompt"),
        }
    }
}
