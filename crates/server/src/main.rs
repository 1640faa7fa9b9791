use accelerator_core::config::AppConfig;
use anyhow::{Context, Result};
use clap::Parser;
use server::{
    cli::{version_string, Cli, Commands, StartArgs},
    logging::init_logging,
    Accelerator,
};
use tokio::signal;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("{}", version_string());
            Ok(())
        }
        Commands::Start(args) => start(args).await,
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    info!("Starting {}", version_string());
    debug!(config = ?config, "Configuration loaded");

    let addr = config.socket_addr().map_err(anyhow::Error::msg)?;
    let upstream = config.upstream.url.clone();

    let accelerator = Accelerator::new(config).context("Failed to build upstream client")?;
    accelerator.startup_check().await.context("Startup check failed to connect")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");
    info!(upstream = %upstream, "Proxying to upstream");

    if let Err(e) = accelerator.serve(listener, shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
