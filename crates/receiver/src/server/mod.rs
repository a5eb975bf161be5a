mod routes;
pub mod receivers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{config::Config, metrics::Metrics, sinks::NotificationSink, transform::Transformer};

pub use receivers::{AlertOutcome, DecodeError, PrometheusReceiver};

/// Shared by all request handlers.
pub struct AppState {
    receiver: Arc<PrometheusReceiver>,
    metrics: Metrics,
}

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: &Config, sink: Arc<dyn NotificationSink>, metrics: Metrics) -> Self {
        let transformer = Transformer::new(config.transform.clone());
        let receiver = PrometheusReceiver::new(transformer, sink, metrics.clone());
        Self {
            state: AppState {
                receiver: Arc::new(receiver),
                metrics,
            },
        }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self.state);

        Router::new()
            .route("/health", any(routes::health))
            .route(
                "/prometheus",
                // Alert storms can exceed the default 2 MB limit; read the whole body.
                post(routes::prometheus_webhook).layer(DefaultBodyLimit::disable()),
            )
            .route("/metrics", get(routes::metrics))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }
}
