use anyhow::{Context, Result};
use clap::Parser;
use mcp_server::config::CliOverrides;
use mcp_server::telemetry::{init_telemetry, log_config_validation, log_startup_info};
use mcp_server::{build_daemon, config};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "howelld")]
#[command(about = "Howell Bridge coordination daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Start the daemon (required; bare invocation prints usage)
    #[arg(long)]
    start: bool,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Bind address override
    #[arg(long, env = "HOWELL_DAEMON_HOST")]
    host: Option<String>,

    /// Root directory under which every store keeps its files
    #[arg(long, env = "HOWELL_PERSIST_ROOT")]
    persist_root: Option<String>,

    /// Configuration file path (TOML)
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Log level override (falls back to RUST_LOG, then "info")
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if !cli.start {
        println!("Howell Bridge coordination daemon");
        println!();
        println!("Usage:");
        println!("  howelld --start --port=7777 --persist-root=/path/to/bridge");
        println!();
        println!("For more options, use: howelld --help");
        return Ok(());
    }

    let overrides = CliOverrides {
        persist_root: cli.persist_root.clone(),
        daemon_host: cli.host.clone(),
        daemon_port: cli.port,
    };
    let cfg = config::load(cli.config.as_deref(), &overrides).context("failed to load configuration")?;

    let log_level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
    init_telemetry(&log_level).context("failed to initialize telemetry")?;
    log_config_validation(&cfg);

    if let Err(e) = cfg.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }
    log_startup_info(&cfg);

    let bind_addr = cfg.bind_addr();
    let daemon = build_daemon(cfg).await.context("failed to assemble daemon")?;

    info!(bind_addr = %bind_addr, "howelld listening");
    println!("howelld is ready: http://{bind_addr}");
    println!("Press Ctrl+C to shut down");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.context("failed to bind daemon socket")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                .expect("failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
        }

        #[cfg(windows)]
        {
            tokio::signal::ctrl_c().await.expect("failed to listen for ctrl_c");
            info!("received Ctrl+C, shutting down");
        }

        let _ = shutdown_tx.send(());
    });

    let server = axum::serve(listener, daemon.router).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });

    match server.await {
        Ok(()) => {
            info!("howelld shut down cleanly");
            for join in daemon.worker_joins {
                join.abort();
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "howelld server error");
            std::process::exit(3);
        }
    }
}
