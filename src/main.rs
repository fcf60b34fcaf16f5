use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ratewarden::config::RateWardenConfig;
use ratewarden::RateLimiter;

/// Check `policy key` lines from stdin against configured rate limits.
#[derive(Debug, Parser)]
#[command(name = "ratewarden", version, about)]
struct Args {
    /// Path to a YAML policy configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the reclamation interval in milliseconds
    #[arg(long)]
    gc_interval_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; logs go to stderr so stdout only carries decisions
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting ratewarden");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => RateWardenConfig::from_file(path)?,
        None => RateWardenConfig::default(),
    };
    let gc_interval = args
        .gc_interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.gc_interval());

    let limiter = Arc::new(RateLimiter::from_config(&config)?);
    info!(policies = ?limiter.policy_names(), "Rate limiter initialized");

    let gc = limiter.spawn_gc(gc_interval);

    tokio::select! {
        result = serve_stdin(&limiter) => result?,
        _ = shutdown_signal() => {}
    }

    gc.shutdown().await;
    info!("ratewarden stopped");
    Ok(())
}

/// Answer `allow` or `deny` for each `policy key` line until EOF.
async fn serve_stdin(limiter: &RateLimiter) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((policy, key)) = line.split_once(char::is_whitespace) else {
            warn!(line = %line, "Expected `policy key`");
            stdout.write_all(b"error\n").await?;
            continue;
        };

        let decision = if limiter.is_allowed(policy, key.trim()) {
            "allow\n"
        } else {
            "deny\n"
        };
        stdout.write_all(decision.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Input closed");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
