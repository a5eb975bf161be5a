pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod sinks;
pub mod sources;
pub mod transform;

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    config::Config,
    metrics::Metrics,
    scheduler::HeartbeatScheduler,
    server::Server,
    sinks::{MadisonClient, NotificationSink},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Serves webhooks and sends heartbeats until `shutdown` resolves.
///
/// In-flight requests are not drained on shutdown.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> Result<()> {
    let metrics = Metrics::new()?;
    let sink: Arc<dyn NotificationSink> = Arc::new(MadisonClient::new(&config)?);

    let app = Server::new(&config, sink.clone(), metrics.clone()).build_router();
    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!(port = config.port, "starting server");

    let heartbeat =
        HeartbeatScheduler::new(sink, config.dms.clone(), config.heartbeat_interval, metrics)
            .spawn();

    let result = tokio::select! {
        result = axum::serve(listener, app).into_future() => result.map_err(Error::from),
        _ = shutdown => {
            info!("shutting down");
            Ok(())
        }
    };
    heartbeat.stop();

    result
}
