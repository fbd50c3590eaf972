pub mod call;
pub mod config;
pub mod handshake;
pub mod keepalive;
pub mod probe;
pub mod report;
pub mod reuse;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mrp_domain::config::Config;

/// mcp-router-probe: diagnostics for an MCP router's SSE session routing.
#[derive(Debug, Parser)]
#[command(name = "mcp-router-probe", version, about)]
pub struct Cli {
    /// Router base URL (overrides `router.base_url`).
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Target service name (overrides `router.service_name`).
    #[arg(long, global = true)]
    pub service: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open one SSE session and send several methods with the same token.
    Reuse {
        /// Skip the warm-up `resources/list`.
        #[arg(long)]
        no_warmup: bool,
    },
    /// Watch an SSE stream for heartbeats and check it stays open.
    Keepalive {
        /// Run for 60 seconds instead of the configured duration.
        #[arg(long)]
        quick: bool,
        /// Duration in seconds (overrides `scenario.keepalive_secs`).
        #[arg(
            long,
            conflicts_with = "quick",
            value_parser = clap::value_parser!(u64).range(1..=MAX_KEEPALIVE_SECS)
        )]
        duration: Option<u64>,
    },
    /// Send `initialize` and check the response is delivered over SSE.
    Handshake {
        /// Router log file to inspect (overrides `scenario.router_log`).
        #[arg(long)]
        router_log: Option<PathBuf>,
    },
    /// Send a single correlated request through a fresh session.
    Call {
        /// JSON-RPC method, e.g. `tools/list`.
        method: String,
        /// Params as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
        /// Request id (defaults to a random UUID).
        #[arg(long)]
        id: Option<String>,
        /// Retries after the first attempt.
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Upper bound for `keepalive --duration` (one day).
pub const MAX_KEEPALIVE_SECS: u64 = 86_400;

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `MRP_CONFIG` (or `probe.toml`).
/// A missing file yields the defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("MRP_CONFIG").unwrap_or_else(|_| "probe.toml".into());

    let path = std::path::Path::new(&config_path);
    let config = if path.exists() {
        Config::load(path).map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// Apply `--base-url` / `--service` on top of the file.
pub fn apply_overrides(config: &mut Config, base_url: Option<String>, service: Option<String>) {
    if let Some(base_url) = base_url {
        config.router.base_url = base_url;
    }
    if let Some(service) = service {
        config.router.service_name = service;
    }
}
