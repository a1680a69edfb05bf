//! Aura — HUD for AI coding agents
//!
//! Monitors AI coding sessions via hooks (Claude Code) and session rollouts
//! (Codex). The daemon runs the IPC server, the rollout watcher, and the
//! session registry; the overlay renderer reads registry snapshots through
//! the `view` projections.

use aura::agents::claude_code::{self, HookAgent};
use aura::registry::SessionRegistry;
use aura::{agents, ipc, server};
use clap::Parser;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "aura", about = "Aura HUD daemon")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Set the session name displayed in the HUD
    SetName {
        /// The name to display for the current session
        name: String,
    },
    /// Handle agent hook events (reads JSON from stdin, forwards to daemon)
    Hook {
        /// Agent type whose hook format to parse
        #[arg(long, value_enum)]
        agent: HookAgent,
    },
    /// Print a hooks config block for the agent's settings file
    HookInstall,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("AURA_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        // The name itself reaches the daemon through hook/rollout parsing of
        // this very command line; the subcommand only confirms.
        Some(Command::SetName { name }) => {
            println!("Session name updated to: {name}");
            ExitCode::SUCCESS
        }
        Some(Command::Hook { ref agent }) => claude_code::run(agent),
        Some(Command::HookInstall) => {
            claude_code::print_install_config();
            ExitCode::SUCCESS
        }
        None => {
            init_tracing(cli.verbose);
            run_daemon()
        }
    }
}

fn run_daemon() -> ExitCode {
    let registry = SessionRegistry::new();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            warn!(error = %e, "failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async {
        // Codex events arrive in-process from the rollout watcher.
        let codex_registry = registry.clone();
        tokio::spawn(async move {
            let mut rx = agents::codex::spawn().subscribe();
            while let Some(event) = rx.recv().await {
                codex_registry.apply(event);
            }
        });

        // Claude Code events arrive over the Unix socket.
        let server_task = tokio::spawn(server::run(registry.clone()));

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for shutdown signal"),
        }

        server_task.abort();
        server::cleanup_socket(&ipc::socket_path());
    });

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_no_subcommand() {
        let cli = Cli::try_parse_from(["aura"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_verbosity_levels() {
        assert_eq!(Cli::try_parse_from(["aura", "-v"]).unwrap().verbose, 1);
        assert_eq!(Cli::try_parse_from(["aura", "-vv"]).unwrap().verbose, 2);
        assert_eq!(Cli::try_parse_from(["aura", "-vvv"]).unwrap().verbose, 3);
    }

    #[test]
    fn cli_set_name() {
        let cli = Cli::try_parse_from(["aura", "set-name", "fix bug"]).unwrap();
        match cli.command {
            Some(Command::SetName { name }) => assert_eq!(name, "fix bug"),
            _ => panic!("expected SetName command"),
        }
    }

    #[test]
    fn cli_hook_claude_code() {
        let cli = Cli::try_parse_from(["aura", "hook", "--agent", "claude-code"]).unwrap();
        match cli.command {
            Some(Command::Hook { agent }) => assert_eq!(agent, HookAgent::ClaudeCode),
            _ => panic!("expected Hook command"),
        }
    }

    #[test]
    fn cli_hook_requires_agent() {
        assert!(Cli::try_parse_from(["aura", "hook"]).is_err());
    }

    #[test]
    fn cli_hook_install() {
        let cli = Cli::try_parse_from(["aura", "hook-install"]).unwrap();
        assert!(matches!(cli.command, Some(Command::HookInstall)));
    }
}
