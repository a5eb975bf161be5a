//! Dead-man's-switch ticker.
//!
//! Runs independently of inbound traffic. Every tick sends one heartbeat and
//! throws the result away: the upstream alerts on missing heartbeats, so a
//! failed ping needs no handling here.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::metrics::Metrics;
use crate::sinks::NotificationSink;

pub struct HeartbeatScheduler {
    sink: Arc<dyn NotificationSink>,
    channel: String,
    interval: Duration,
    metrics: Metrics,
}

/// Handle to a running heartbeat task.
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl HeartbeatScheduler {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        channel: String,
        interval: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            sink,
            channel,
            interval,
            metrics,
        }
    }

    /// Starts ticking. The first heartbeat goes out one interval from now.
    pub fn spawn(self) -> HeartbeatHandle {
        info!(
            channel = %self.channel,
            interval_secs = self.interval.as_secs(),
            "starting heartbeat scheduler"
        );
        HeartbeatHandle {
            task: tokio::spawn(self.run()),
        }
    }

    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.beat().await;
        }
    }

    /// Sends one heartbeat. Errors are intentionally discarded.
    pub async fn beat(&self) {
        let result = self.sink.send_heartbeat(&self.channel).await;
        self.metrics.heartbeat(result.is_ok());
        if let Err(e) = result {
            debug!(channel = %self.channel, error = %e, "heartbeat not delivered");
        }
    }
}
