use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use alertreceiver::config::{Config, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "alertreceiver", version, about = "Relays AlertManager webhooks to Madison")]
struct Args {
    /// Dotenv file with configuration. Defaults to `.env` next to the executable.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_file = match args.env_file {
        Some(path) => path,
        None => default_env_file().context("failed to get executable path")?,
    };
    let config = Config::load(&env_file).context("failed to load configuration")?;

    init_logging(config.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), "starting alertreceiver");

    let port = config.port;
    alertreceiver::run(config, shutdown_signal())
        .await
        .with_context(|| format!("alertreceiver failed on port {port}"))?;

    Ok(())
}

fn default_env_file() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(|dir| dir.join(".env"))
        .unwrap_or_else(|| PathBuf::from(".env")))
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        // Without a Ctrl+C handler, SIGTERM is still honored.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
