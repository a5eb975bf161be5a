use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{DeliveryError, NotificationSink};
use crate::config::Config;
use crate::transform::OutboundNotification;

/// Label identifying this service as the source of a notification.
pub const SOURCE_MARKER: &str = "alertreceiver";
pub const HEARTBEAT_TRIGGER: &str = "DeadMansSwitch";

const RESERVED_LABELS: [&str; 4] = ["trigger", "severity_level", SOURCE_MARKER, "grafana"];

/// Body of an alert event as Madison expects it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AlertPayload {
    pub labels: BTreeMap<String, String>,
    pub annotations: AlertAnnotations,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AlertAnnotations {
    pub summary: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
struct HeartbeatPayload<'a> {
    labels: HeartbeatLabels<'a>,
}

#[derive(Debug, Serialize)]
struct HeartbeatLabels<'a> {
    trigger: &'a str,
    dms: &'a str,
}

impl From<&OutboundNotification> for AlertPayload {
    fn from(notification: &OutboundNotification) -> Self {
        let mut labels: BTreeMap<String, String> = notification
            .extra_labels
            .iter()
            .filter(|(k, _)| !RESERVED_LABELS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        labels.insert("trigger".to_string(), notification.trigger.clone());
        labels.insert(
            "severity_level".to_string(),
            notification.severity_level.clone(),
        );
        labels.insert(SOURCE_MARKER.to_string(), SOURCE_MARKER.to_string());
        if let Some(grafana) = &notification.grafana {
            labels.insert("grafana".to_string(), grafana.clone());
        }

        Self {
            labels,
            annotations: AlertAnnotations {
                summary: notification.summary.clone(),
                description: notification.description.clone(),
            },
        }
    }
}

/// Client for Madison's custom events endpoint.
///
/// The API key is part of the URL, so the endpoint is never logged. The inner
/// `reqwest::Client` pools connections and is cheap to clone.
#[derive(Clone)]
pub struct MadisonClient {
    endpoint: String,
    client: Client,
}

impl MadisonClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_endpoint(config.madison_endpoint(), config.request_timeout)
    }

    pub fn with_endpoint(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(DeliveryError::Forbidden);
        }
        if status.as_u16() >= 400 {
            // The body is diagnostic only; a failure to read it is not worth
            // masking the status.
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "madison accepted event");
        Ok(())
    }
}

impl std::fmt::Debug for MadisonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MadisonClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl NotificationSink for MadisonClient {
    async fn send_alert(&self, notification: &OutboundNotification) -> Result<(), DeliveryError> {
        self.post(&AlertPayload::from(notification)).await
    }

    async fn send_heartbeat(&self, channel: &str) -> Result<(), DeliveryError> {
        let payload = HeartbeatPayload {
            labels: HeartbeatLabels {
                trigger: HEARTBEAT_TRIGGER,
                dms: channel,
            },
        };
        self.post(&payload).await
    }
}
