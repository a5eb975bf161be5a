pub mod alertmanager;

pub use alertmanager::{AlertManagerAlert, AlertManagerWebhook};
