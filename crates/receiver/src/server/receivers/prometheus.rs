use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use futures::future::join_all;
use http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    metrics::Metrics,
    sinks::{madison::AlertPayload, DeliveryError, NotificationSink},
    sources::{AlertManagerAlert, AlertManagerWebhook},
    transform::Transformer,
};

/// Why an inbound webhook could not be accepted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("failed to decode webhook: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, "Bad request").into_response()
    }
}

/// Result of forwarding one alert.
#[derive(Debug)]
pub struct AlertOutcome {
    pub alert_name: String,
    pub trigger: String,
    pub result: Result<(), DeliveryError>,
}

/// Turns AlertManager webhooks into Madison notifications.
pub struct PrometheusReceiver {
    transformer: Transformer,
    sink: Arc<dyn NotificationSink>,
    metrics: Metrics,
}

impl PrometheusReceiver {
    pub fn new(transformer: Transformer, sink: Arc<dyn NotificationSink>, metrics: Metrics) -> Self {
        Self {
            transformer,
            sink,
            metrics,
        }
    }

    pub fn decode(body: &[u8]) -> Result<AlertManagerWebhook, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Forwards every alert in the webhook.
    ///
    /// All alerts are attempted regardless of how their siblings fare; the
    /// returned outcomes are in the webhook's alert order.
    pub async fn handle_webhook(&self, webhook: AlertManagerWebhook) -> Vec<AlertOutcome> {
        info!(
            version = %webhook.version,
            group_key = %webhook.group_key,
            status = %webhook.status,
            receiver = %webhook.receiver,
            alerts_count = webhook.alerts.len(),
            "received alertmanager webhook"
        );
        debug!(webhook = %serde_json::to_string(&webhook).unwrap_or_default(), "webhook payload");

        join_all(webhook.alerts.iter().map(|alert| self.forward(alert))).await
    }

    async fn forward(&self, alert: &AlertManagerAlert) -> AlertOutcome {
        let notification = self.transformer.transform(alert);

        info!(
            alert_name = %notification.alert_name,
            status = %alert.status,
            severity = alert.label("severity").unwrap_or_default(),
            trigger = %notification.trigger,
            summary = %notification.summary,
            "processing alert"
        );
        debug!(alert = %serde_json::to_string(alert).unwrap_or_default(), "alert payload");

        let payload = serde_json::to_string(&AlertPayload::from(&notification)).unwrap_or_default();
        let result = self.sink.send_alert(&notification).await;

        match &result {
            Ok(()) => {
                self.metrics.alert_forwarded("sent");
                info!(
                    alert_name = %notification.alert_name,
                    trigger = %notification.trigger,
                    payload = %payload,
                    "alert sent to madison"
                );
            }
            Err(e) => {
                self.metrics.alert_forwarded(e.kind());
                error!(
                    error = %e,
                    alert_name = %notification.alert_name,
                    trigger = %notification.trigger,
                    payload = %payload,
                    "failed to send alert to madison"
                );
            }
        }

        AlertOutcome {
            alert_name: notification.alert_name,
            trigger: notification.trigger,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MockNotificationSink;
    use crate::transform::TransformOptions;
    use std::collections::HashMap;

    fn alert(name: &str, status: &str) -> AlertManagerAlert {
        AlertManagerAlert {
            status: status.to_string(),
            labels: HashMap::from([("alertname".to_string(), name.to_string())]),
            ..Default::default()
        }
    }

    fn receiver(sink: MockNotificationSink) -> PrometheusReceiver {
        PrometheusReceiver::new(
            Transformer::new(TransformOptions::default()),
            Arc::new(sink),
            Metrics::new().unwrap(),
        )
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            PrometheusReceiver::decode(b"{not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            PrometheusReceiver::decode(br#"{"alerts": "nope"}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_every_alert_is_attempted_when_one_fails() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send_alert().times(3).returning(|n| {
            if n.trigger == "B" {
                Err(DeliveryError::Forbidden)
            } else {
                Ok(())
            }
        });

        let webhook = AlertManagerWebhook {
            alerts: vec![alert("A", "firing"), alert("B", "firing"), alert("C", "resolved")],
            ..Default::default()
        };
        let outcomes = receiver(sink).handle_webhook(webhook).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].trigger, "A");
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(DeliveryError::Forbidden)));
        assert_eq!(outcomes[2].trigger, "C_Resolved");
        assert!(outcomes[2].result.is_ok());
    }

    #[tokio::test]
    async fn test_empty_webhook_sends_nothing() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send_alert().never();

        let outcomes = receiver(sink)
            .handle_webhook(AlertManagerWebhook::default())
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send_alert().times(2).returning(|n| {
            if n.trigger == "A" {
                Ok(())
            } else {
                Err(DeliveryError::UpstreamRejected {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            }
        });

        let receiver = receiver(sink);
        let webhook = AlertManagerWebhook {
            alerts: vec![alert("A", "firing"), alert("B", "firing")],
            ..Default::default()
        };
        receiver.handle_webhook(webhook).await;

        let text = receiver.metrics.gather().unwrap();
        assert!(text.contains(r#"alertreceiver_alerts_forwarded_total{outcome="sent"} 1"#));
        assert!(text.contains(r#"alertreceiver_alerts_forwarded_total{outcome="rejected"} 1"#));
    }
}
