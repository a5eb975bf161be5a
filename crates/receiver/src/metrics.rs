use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters exposed on `/metrics`.
///
/// Owned by the server state rather than registered globally, so each router
/// (and each test) gets its own registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    webhooks_total: IntCounterVec,
    alerts_forwarded_total: IntCounterVec,
    heartbeats_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let webhooks_total = IntCounterVec::new(
            Opts::new(
                "alertreceiver_webhooks_total",
                "Webhook deliveries received from AlertManager.",
            ),
            &["result"],
        )?;
        let alerts_forwarded_total = IntCounterVec::new(
            Opts::new(
                "alertreceiver_alerts_forwarded_total",
                "Alerts forwarded to Madison, by outcome.",
            ),
            &["outcome"],
        )?;
        let heartbeats_total = IntCounterVec::new(
            Opts::new(
                "alertreceiver_heartbeats_total",
                "Dead-man's-switch pings, by outcome.",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(webhooks_total.clone()))?;
        registry.register(Box::new(alerts_forwarded_total.clone()))?;
        registry.register(Box::new(heartbeats_total.clone()))?;

        Ok(Self {
            registry,
            webhooks_total,
            alerts_forwarded_total,
            heartbeats_total,
        })
    }

    pub fn webhook_accepted(&self) {
        self.webhooks_total.with_label_values(&["accepted"]).inc();
    }

    pub fn webhook_rejected(&self) {
        self.webhooks_total.with_label_values(&["rejected"]).inc();
    }

    /// `outcome` is "sent" or a `DeliveryError::kind`.
    pub fn alert_forwarded(&self, outcome: &str) {
        self.alerts_forwarded_total.with_label_values(&[outcome]).inc();
    }

    pub fn heartbeat(&self, sent: bool) {
        let outcome = if sent { "sent" } else { "failed" };
        self.heartbeats_total.with_label_values(&[outcome]).inc();
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = vec![];
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_rendered() {
        let metrics = Metrics::new().unwrap();
        metrics.webhook_accepted();
        metrics.alert_forwarded("sent");
        metrics.alert_forwarded("forbidden");
        metrics.heartbeat(false);

        let text = metrics.gather().unwrap();
        assert!(text.contains(r#"alertreceiver_webhooks_total{result="accepted"} 1"#));
        assert!(text.contains(r#"alertreceiver_alerts_forwarded_total{outcome="sent"} 1"#));
        assert!(text.contains(r#"alertreceiver_alerts_forwarded_total{outcome="forbidden"} 1"#));
        assert!(text.contains(r#"alertreceiver_heartbeats_total{outcome="failed"} 1"#));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.webhook_rejected();
        assert!(!b.gather().unwrap().contains("rejected"));
    }
}
