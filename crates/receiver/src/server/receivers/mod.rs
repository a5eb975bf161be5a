mod prometheus;

pub use prometheus::{AlertOutcome, DecodeError, PrometheusReceiver};
