//! Command-line surface (boundary only, `spec.md` §6.4 / `SPEC_FULL.md` §6.4).

use clap::{Parser, Subcommand};

/// Interactive CLI orchestrator for an AI coding assistant backed by a
/// remote sandbox.
#[derive(Parser, Debug)]
#[clap(name = "vessel", about = "Interactive CLI for the sandboxed coding agent")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Agent profile name; keys all persisted sandbox state.
    #[arg(long, default_value = "default")]
    pub agent: String,

    /// Path to the agent's config.toml (default: `~/.config/<agent>/config.toml`).
    #[arg(long)]
    pub config: Option<String>,

    /// Resolve every human-in-the-loop interrupt as approved without prompting.
    #[arg(long)]
    pub auto_approve: bool,

    /// Attach to this sandbox id instead of the cached/default one.
    #[arg(long)]
    pub sandbox_id: Option<String>,

    /// Suppress the startup splash banner.
    #[arg(long)]
    pub no_splash: bool,

    /// Always bring up a fresh sandbox, discarding any cached record.
    #[arg(long)]
    pub new_sandbox: bool,

    /// Require plan approval before any write-capable tool executes.
    #[arg(long)]
    pub plan_mode: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List known agent profiles under the state root.
    List,
    /// Reset an agent's memory file (`agent.md`).
    Reset {
        /// Agent profile to reset (defaults to `--agent`).
        agent: Option<String>,
        /// Copy another agent's memory instead of deleting this one's.
        #[arg(long)]
        from: Option<String>,
    },
    /// Print the in-session slash-command reference and exit.
    Help,
}
