use std::sync::Arc;

use clap::Parser;
use colored::*;

mod cli_args;
mod commands;
mod config;
mod executor;
mod fault;
mod http_runtime;
mod input;
mod turn_controller;
mod ui;

use cli_args::{CliArgs, Commands};
use http_runtime::HttpModelRuntime;
use vessel_agent::{
    AgentMemory, SandboxRequest, SessionManager, SessionStore, ToolRegistry, all_builtin_tools,
};
use vessel_sandbox::HttpSandbox;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let state_root = config::config_root().join(&args.agent).join("state");
    vessel_utils::telemetry::setup_logging(&format!("vessel-{}", args.agent), &state_root);

    let exit_code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            ui::print_assistant_error(&e.to_string());
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    if let Some(command) = &args.command {
        return run_subcommand(command, &args.agent);
    }

    let config_path = config::config_path(&args.agent, args.config.as_deref());
    let cli_config = config::load_config(&config_path)?;

    let state_root = config::config_root().join(&args.agent).join("state");
    let store = SessionStore::new(state_root.as_path());
    let manager = SessionManager::new(store, true);

    let sandbox: Arc<dyn vessel_sandbox::RemoteSandbox> =
        Arc::new(HttpSandbox::new(cli_config.sandbox_base_url.clone()));

    let mut tool_registry = ToolRegistry::new();
    for tool in all_builtin_tools() {
        tool_registry.add(tool);
    }

    let request = if args.new_sandbox {
        SandboxRequest::Fresh
    } else if let Some(id) = &args.sandbox_id {
        SandboxRequest::Explicit(id.clone())
    } else {
        SandboxRequest::Cached
    };

    let session = manager
        .acquire(&args.agent, &cli_config, sandbox, tool_registry, request)
        .await?;

    if !args.no_splash {
        ui::print_splash(&session.agent_name);
    }

    let memory = AgentMemory::load(
        &config::config_root(),
        &args.agent,
        &std::env::current_dir().unwrap_or_default(),
    );
    if memory.render().is_some() {
        ui::print_info("loaded agent memory");
    }

    let tool_context: Arc<dyn vessel_agent::ToolContext> = Arc::new(
        vessel_agent::AgentToolContext::new(
            session.agent_name.clone(),
            Some(std::path::PathBuf::from("/home/agent")),
            session.sandbox.clone(),
        )
        .with_read_only(args.plan_mode),
    );
    let runtime = HttpModelRuntime::new(
        cli_config.sandbox_base_url.clone(),
        Arc::new(session.tool_registry.clone()),
        tool_context,
    );
    let controller = turn_controller::TurnController {
        session: &session,
        manager: &manager,
        config: &cli_config,
        plan_mode: args.plan_mode,
        auto_approve: args.auto_approve,
    };
    controller.run(&runtime).await;

    manager.teardown(&session, true).await?;
    Ok(())
}

fn run_subcommand(command: &Commands, default_agent: &str) -> anyhow::Result<()> {
    match command {
        Commands::List => list_agents(),
        Commands::Reset { agent, from } => {
            let target = agent.clone().unwrap_or_else(|| default_agent.to_string());
            reset_agent(&target, from.as_deref())
        }
        Commands::Help => {
            commands::print_help();
            Ok(())
        }
    }
}

/// `vessel list`: enumerate `<config_root>/*` agent profiles, marking each
/// with `●`/`○` depending on whether `agent.md` exists
/// (`SPEC_FULL.md` §6.4 ADDED).
fn list_agents() -> anyhow::Result<()> {
    let root = config::config_root();
    let Ok(entries) = std::fs::read_dir(&root) else {
        ui::print_info("no agent profiles yet");
        return Ok(());
    };
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let has_memory = entry.path().join("agent.md").exists();
        let marker = if has_memory {
            "●".bright_green()
        } else {
            "○".bright_black()
        };
        println!("{marker} {name}");
    }
    Ok(())
}

/// `vessel reset [agent] [--from <agent>]`: delete (or copy from another
/// profile) an agent's `agent.md` memory file (`SPEC_FULL.md` §6.4 ADDED).
fn reset_agent(agent: &str, from: Option<&str>) -> anyhow::Result<()> {
    let root = config::config_root();
    let dest = root.join(agent).join("agent.md");

    if let Some(source_agent) = from {
        let src = root.join(source_agent).join("agent.md");
        std::fs::create_dir_all(dest.parent().unwrap())?;
        std::fs::copy(&src, &dest)?;
        ui::print_success(&format!("copied memory from {source_agent} to {agent}"));
    } else if dest.exists() {
        std::fs::remove_file(&dest)?;
        ui::print_success(&format!("reset memory for {agent}"));
    } else {
        ui::print_info(&format!("{agent} has no memory file to reset"));
    }
    Ok(())
}
