mod core_module;
mod gateway;
mod terminal_output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use switchboard_commands::Engine;
use switchboard_config::{config_dir, config_file_path, load_config, validate, LoggingConfig, SwitchboardConfig};
use switchboard_core::{NoopGateway, SurfaceType};
use switchboard_logging::{init_logger, spawn_event_logger};
use switchboard_modules::{ModuleManager, StartOptions, UnloadReason};

use core_module::CoreModule;
use gateway::{ConsoleGateway, ConsoleSession};
use terminal_output::{note_info, note_success, print_report, render_table};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Switchboard: command dispatch and module lifecycle engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine, reading text messages from stdin
    Run {
        /// Config file (default: ~/.switchboard/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Actor id the console speaks as
        #[arg(long, default_value = "console")]
        actor: String,
        #[arg(long, default_value = "console")]
        channel: String,
        /// Guild id; omit to send direct messages
        #[arg(long)]
        guild: Option<String>,
    },
    /// Validate a config file
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the commands the built-in modules register
    Commands {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, actor, channel, guild } => {
            let config = load_checked(&resolve(config)).await?;
            init_logging(&config.logging);
            run(config, ConsoleSession { actor, channel, guild }).await?;
        }
        Commands::Check { config } => {
            let path = resolve(config);
            load_checked(&path).await?;
            note_success(&format!("{} is valid", path.display()));
        }
        Commands::Commands { config } => {
            let config = load_checked(&resolve(config)).await?;
            print!("{}", command_table(config).await?);
        }
    }

    Ok(())
}

/// Install the logger; returns `false` and warns if one was already set.
fn init_logging(logging: &LoggingConfig) -> bool {
    let installed = init_logger(&logging.level, logging.dir.as_deref());
    if !installed {
        warn!("A global logger was already installed; logging config ignored");
    }
    installed
}

fn resolve(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(|| config_file_path(&config_dir()))
}

/// Load the config and print its validation report; errors abort.
async fn load_checked(path: &Path) -> Result<SwitchboardConfig> {
    let config = load_config(path).await?;
    let report = validate(&config);
    print_report(&report);
    if !report.is_valid() {
        bail!("{} config error(s) in {}", report.errors.len(), path.display());
    }
    Ok(config)
}

async fn run(config: SwitchboardConfig, session: ConsoleSession) -> Result<()> {
    let prefix = config.prefix.clone();
    let engine = Engine::new(config, Arc::new(ConsoleGateway::stdout()));
    let _events = spawn_event_logger(engine.bus());
    let _sweeper = engine.spawn_sweeper();

    let modules = ModuleManager::new(engine.clone());
    modules.install(Arc::new(CoreModule::default()), StartOptions::default()).await?;
    engine.register_remote_commands().await?;
    info!(actor = %session.actor, channel = %session.channel, "Switchboard running");
    note_info(&format!("Type {prefix}help for commands, Ctrl-D to quit"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Vec<tokio::task::JoinHandle<_>> = Vec::new();
    let mut seq = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                seq += 1;
                pending.retain(|task| !task.is_finished());
                pending.push(engine.spawn_dispatch(session.message(&line, seq)));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    futures::future::join_all(pending).await;
    let unloaded = modules.unload_all(&UnloadReason::Shutdown).await;
    info!(modules = unloaded, "Switchboard stopped");
    Ok(())
}

/// Table of every registered command after installing the built-in modules.
async fn command_table(config: SwitchboardConfig) -> Result<String> {
    let engine = Engine::new(config, Arc::new(NoopGateway));
    ModuleManager::new(engine.clone())
        .install(Arc::new(CoreModule::default()), StartOptions::default())
        .await?;

    let registry = engine.registry();
    let mut rows = Vec::new();
    for surface in SurfaceType::ALL {
        for def in registry.list(surface).await {
            let owner = registry.owner_of(surface, &def.name).await.unwrap_or_else(|| "-".into());
            let cooldown = if def.cooldown_ms == 0 { "-".to_string() } else { format!("{}ms", def.cooldown_ms) };
            rows.push(vec![surface.to_string(), def.name.clone(), def.aliases().join(", "), cooldown, owner]);
        }
    }
    Ok(render_table(&["Surface", "Name", "Aliases", "Cooldown", "Module"], &rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_table_lists_core_commands() {
        let table = terminal_output::strip_ansi(&command_table(SwitchboardConfig::default()).await.unwrap());
        assert!(table.contains("help"));
        assert!(table.contains("commands"));
        assert!(table.contains("5000ms"));
        assert!(table.lines().filter(|l| l.contains("core")).count() == 2);
    }

    #[test]
    fn second_logger_install_is_refused() {
        let logging = LoggingConfig::default();
        init_logging(&logging);
        assert!(!init_logging(&logging));
    }

    #[tokio::test]
    async fn missing_config_file_is_valid() {
        let dir = std::env::temp_dir().join(format!("switchboard-cli-{}", std::process::id()));
        let config = load_checked(&dir.join("absent.yaml")).await.unwrap();
        assert_eq!(config.prefix, "!");
    }
}
