//! Terminal sink: the single place that writes to stdout/stderr, so the
//! flush-then-print discipline from `spec.md` §5 holds (streaming text,
//! tool lines, and panels are never interleaved out of order).

use colored::*;
use spinners::{Spinner, Spinners};
use std::io::{self, Write};

pub fn print_separator() {
    println!("{}", "─".repeat(50).bright_black());
}

pub fn print_splash(agent: &str) {
    println!("{}", "vessel — sandboxed coding agent".bright_blue().bold());
    println!("Agent: {}", agent.bright_green());
    println!("{}", "Type '/help' for commands, '/exit' to quit".bright_black());
    print_separator();
}

/// Flush pending assistant text to the terminal. Call before starting or
/// stopping a spinner, and before printing a tool line, so output never
/// interleaves mid-line.
pub fn flush_text(buffer: &mut String) {
    if !buffer.is_empty() {
        print!("{buffer}");
        let _ = io::stdout().flush();
        buffer.clear();
    }
}

pub struct TurnSpinner(Option<Spinner>);

impl TurnSpinner {
    pub fn start(label: &str) -> Self {
        Self(Some(Spinner::new(
            Spinners::Dots12,
            label.bright_magenta().to_string(),
        )))
    }

    pub fn stop(&mut self) {
        if let Some(mut sp) = self.0.take() {
            sp.stop();
            print!("\r\x1B[K");
            let _ = io::stdout().flush();
        }
    }
}

impl Drop for TurnSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `icon name(arg-summary)` tool invocation line (`spec.md` §4.5 Phase 2).
pub fn print_tool_call_line(name: &str, arg_summary: &str) {
    if arg_summary.is_empty() {
        println!("{} {}", "$$".bright_yellow(), name.bold());
    } else {
        println!(
            "{} {}({})",
            "$$".bright_yellow(),
            name.bold(),
            arg_summary.bright_black()
        );
    }
}

pub fn print_tool_fault(message: &str) {
    println!("{} {}", "✗".bright_red(), message.bright_red());
}

pub fn print_recovery_notice(message: &str) {
    println!("{} {}", "↻".bright_yellow(), message.bright_yellow());
}

pub fn print_assistant_error(message: &str) {
    eprintln!("{} {}", "Error:".bright_red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "!".bright_yellow(), message);
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".bright_green(), message);
}

/// Render a human-in-the-loop approval panel and block on a two-option
/// menu (`spec.md` §4.5 Phase 3): Accept, or Reject with free-text feedback.
pub fn render_hitl_panel(header: &str, description: &str) -> HitlChoice {
    print_separator();
    println!("{}", header.bright_cyan().bold());
    println!("{description}");
    print_separator();
    println!(
        "{} accept   {} reject (you'll be asked for feedback)",
        "[1]".bright_green().bold(),
        "[2]".bright_red().bold()
    );
    print!("> ");
    let _ = io::stdout().flush();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return HitlChoice::Reject("User cancelled".to_string());
    }
    match input.trim() {
        "2" | "reject" | "r" => {
            print!("feedback> ");
            let _ = io::stdout().flush();
            let mut feedback = String::new();
            let _ = io::stdin().read_line(&mut feedback);
            let feedback = feedback.trim();
            HitlChoice::Reject(if feedback.is_empty() {
                "No reason provided".to_string()
            } else {
                feedback.to_string()
            })
        }
        _ => HitlChoice::Accept,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitlChoice {
    Accept,
    Reject(String),
}

/// Repaint a TODO panel from a state-delta update (`spec.md` §4.5 Phase 2).
pub fn print_todo_panel(items: &[(String, bool)]) {
    print_separator();
    println!("{}", "TODO".bright_cyan().bold());
    for (item, done) in items {
        if *done {
            println!("  {} {}", "[x]".bright_green(), item.strikethrough());
        } else {
            println!("  {} {}", "[ ]".bright_black(), item);
        }
    }
    print_separator();
}
