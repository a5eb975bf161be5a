use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::{IntoResponse, Response},
};
use http::StatusCode;
use tracing::{error, warn};

use super::{
    receivers::{DecodeError, PrometheusReceiver},
    AppState,
};

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.gather() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn prometheus_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let webhook = match body
        .map_err(|e| DecodeError::Body(e.body_text()))
        .and_then(|bytes| PrometheusReceiver::decode(&bytes))
    {
        Ok(webhook) => webhook,
        Err(e) => {
            warn!(error = %e, "rejecting alertmanager webhook");
            state.metrics.webhook_rejected();
            return e.into_response();
        }
    };
    state.metrics.webhook_accepted();

    // Forwarding runs on its own task so a disconnecting caller cannot cancel
    // it halfway through the alert list.
    let receiver = state.receiver.clone();
    let task = tokio::spawn(async move { receiver.handle_webhook(webhook).await });
    if let Err(e) = task.await {
        error!(error = %e, "alert forwarding task failed");
    }

    StatusCode::OK.into_response()
}
