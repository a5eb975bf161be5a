//! Outbound delivery of notifications and heartbeats.

pub mod madison;

use async_trait::async_trait;
use thiserror::Error;

use crate::transform::OutboundNotification;

pub use madison::MadisonClient;

/// Why a single delivery failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The API key is wrong or lacks permission. Not transient.
    #[error("upstream returned 403 Forbidden - check key and permissions")]
    Forbidden,

    #[error("upstream returned status {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    /// Connect, timeout or body encoding failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Forbidden => "forbidden",
            DeliveryError::UpstreamRejected { .. } => "rejected",
            DeliveryError::Transport(_) => "transport",
        }
    }
}

/// Destination for normalized notifications and dead-man's-switch pings.
///
/// Implementations are shared across request tasks and the heartbeat ticker.
/// Neither method retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_alert(&self, notification: &OutboundNotification) -> Result<(), DeliveryError>;

    /// Callers are expected to drop the result; see `scheduler`.
    async fn send_heartbeat(&self, channel: &str) -> Result<(), DeliveryError>;
}
