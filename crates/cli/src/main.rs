use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mrp_cli::cli::call::CallArgs;
use mrp_cli::cli::probe::Probe;
use mrp_cli::cli::{Cli, Command, ConfigCommand};

/// Seconds the keep-alive check runs with `--quick`.
const QUICK_KEEPALIVE_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    let passed = match cli.command {
        Command::Version => {
            println!("mcp-router-probe {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate) => {
            let (mut config, config_path) = mrp_cli::cli::load_config()?;
            mrp_cli::cli::apply_overrides(&mut config, cli.base_url, cli.service);
            mrp_cli::cli::config::validate(&config, &config_path)
        }
        Command::Config(ConfigCommand::Show) => {
            let (mut config, _config_path) = mrp_cli::cli::load_config()?;
            mrp_cli::cli::apply_overrides(&mut config, cli.base_url, cli.service);
            mrp_cli::cli::config::show(&config)?;
            true
        }
        command => {
            let (mut config, config_path) = mrp_cli::cli::load_config()?;
            mrp_cli::cli::apply_overrides(&mut config, cli.base_url, cli.service);
            tracing::debug!(config_path = %config_path, "configuration loaded");
            let probe = Probe::new(config)?;
            run_scenario(&probe, command).await?
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_scenario(probe: &Probe, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Reuse { no_warmup } => mrp_cli::cli::reuse::run(probe, !no_warmup).await,
        Command::Keepalive { quick, duration } => {
            let secs = if quick {
                QUICK_KEEPALIVE_SECS
            } else {
                duration.unwrap_or(probe.config.scenario.keepalive_secs)
            };
            mrp_cli::cli::keepalive::run(probe, Duration::from_secs(secs)).await
        }
        Command::Handshake { router_log } => {
            mrp_cli::cli::handshake::run(probe, router_log.as_deref()).await
        }
        Command::Call {
            method,
            params,
            id,
            retries,
            json,
        } => {
            let args = CallArgs {
                method,
                params,
                id,
                retries,
                json,
            };
            mrp_cli::cli::call::run(probe, args).await
        }
        Command::Config(_) | Command::Version => Ok(true),
    }
}

/// Compact human-readable logs on stderr; stdout is reserved for reports.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mrp_client=info,mrp_cli=info,mrp_domain=info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
