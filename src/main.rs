//! CLI entry point for the rig console.
//!
//! # Usage
//!
//! Run the interactive console (commands on stdin, `quit` to leave):
//! ```bash
//! rig-console run --address 192.168.1.20:8800
//! ```
//!
//! Take one capture-and-classify shot and print the result cards:
//! ```bash
//! rig-console shoot --config config/rig-console.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rig_console::address::{resolve_address, ServerAddress};
use rig_console::api::{HttpRigApi, RigApi};
use rig_console::config::{ConsoleConfig, DEFAULT_CONFIG_PATH};
use rig_console::console::{Console, OperatorCommand};
use rig_console::gallery::{GalleryPresenter, MemoryHost};
use rig_console::logging::{self, OutputFormat, TracingConfig};
use rig_console::orchestrator::CaptureOrchestrator;
use rig_console::setpoints::SetpointList;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Parser)]
#[command(name = "rig-console")]
#[command(about = "Operator console for the inspection rig", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Server address (`host` or `host:port`); overrides config and RIG_CONSOLE_ADDR
    #[arg(long, global = true)]
    address: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive console
    Run,

    /// Capture and classify once, then exit
    Shoot,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConsoleConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let tracing_config = TracingConfig::from_console_config(&config)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format);
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    let address = resolve_address(
        cli.address.as_deref(),
        &config.server.address,
        config.server.scheme_policy,
    )?;
    tracing::info!(%address, source = address.source().label(), "Using server");

    match cli.command {
        Commands::Run => run_console(config, address).await,
        Commands::Shoot => shoot_once(config, address).await,
    }
}

async fn run_console(config: ConsoleConfig, address: ServerAddress) -> Result<()> {
    let mut console = Console::connect_http(config, address, MemoryHost::new());
    console.seed_setpoints().await;
    console.connect_all()?;

    let (command_tx, command_rx) = mpsc::channel(16);
    // Blocking stdin lives on its own thread so quitting never waits on a read.
    std::thread::spawn(move || read_commands(&command_tx));

    println!("{}", rig_console::console::USAGE);
    console.run(command_rx, |line| println!("{line}")).await;
    Ok(())
}

fn read_commands(commands: &mpsc::Sender<OperatorCommand>) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<OperatorCommand>() {
            Ok(command) => {
                if commands.blocking_send(command).is_err() {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }
}

async fn shoot_once(config: ConsoleConfig, address: ServerAddress) -> Result<()> {
    let api: Arc<dyn RigApi> = Arc::new(HttpRigApi::new(address, config.request_timeout()));
    let setpoints = SetpointList::from_seed(
        api.initial_setpoints()
            .await
            .context("fetching initial setpoints")?,
    );
    if setpoints.is_empty() {
        anyhow::bail!("server returned no setpoints");
    }

    let orchestrator = CaptureOrchestrator::new(api);
    let gallery = Mutex::new(GalleryPresenter::new(MemoryHost::new()));
    let outcome = orchestrator
        .run_capture_and_classify(&setpoints, &gallery)
        .await?;

    println!(
        "{} slide pairs, saved to {}",
        outcome.slides, outcome.classification.save_place
    );
    for (rank, card) in outcome.classification.cards.iter().enumerate() {
        println!("{:>2}. {card}", rank + 1);
    }
    if outcome.classification.dropped > 0 {
        println!(
            "{} result(s) dropped: reference images unavailable",
            outcome.classification.dropped
        );
    }
    Ok(())
}
