use accelerator_core::config::AppConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "SEDA Cosmos Accelerator - caching reverse proxy for Tendermint RPC")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version
    Version,

    /// Start the proxy
    Start(StartArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Flags for `start`. Anything left unset keeps the value from the config file,
/// the environment, or the compiled default.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on [default: 5384]
    #[arg(short, long, env = "SERVER_PORT")]
    pub port: Option<u16>,

    /// Server to proxy to [default: localhost:26657]
    #[arg(short, long, env = "RPC_SERVER")]
    pub server: Option<String>,

    /// Interval to check the height of the server in milliseconds [default: 1000]
    #[arg(short = 'i', long)]
    pub height_check_interval: Option<u64>,

    /// Log level to use (trace, debug, info, warn, error) [default: info]
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Path to a TOML config file [default: config/config.toml]
    #[arg(short, long, env = "ACCELERATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Forward every request without caching
    #[arg(long)]
    pub no_cache: bool,
}

impl StartArgs {
    /// Overrides `config` with every flag that was given.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(server) = &self.server {
            config.upstream.url.clone_from(server);
        }
        if let Some(interval) = self.height_check_interval {
            config.cache.height_check_interval_ms = interval;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_ascii_lowercase();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format.as_str().to_string();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

#[must_use]
pub fn version_string() -> String {
    format!("SEDA Cosmos Accelerator v{}", env!("CARGO_PKG_VERSION"))
}
