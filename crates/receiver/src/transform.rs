//! Mapping from AlertManager alerts to Madison notifications.
//!
//! Everything here is pure: no I/O, no failure paths. Every missing or empty
//! input is replaced by a default, so each output field is non-empty.

use std::collections::BTreeMap;

use crate::sources::AlertManagerAlert;

pub const UNKNOWN_ALERT_NAME: &str = "Unknown";
pub const DEFAULT_SEVERITY: &str = "5";
pub const RESOLVED_TRIGGER_SUFFIX: &str = "_Resolved";
pub const RESOLVED_SUMMARY_PREFIX: &str = "✅ Resolved: ";
pub const NO_DESCRIPTION: &str = "No description provided";

/// Presentation toggles for the optional enrichments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Prefix resolved summaries with [`RESOLVED_SUMMARY_PREFIX`].
    pub resolved_summary_prefix: bool,
    /// Attach the dashboard (or generator) URL as a `grafana` label.
    pub grafana_label: bool,
    /// Remove emoji from the description annotation.
    pub strip_description_emoji: bool,
    /// Copy every inbound alert label onto the outbound notification.
    pub forward_alert_labels: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            resolved_summary_prefix: true,
            grafana_label: true,
            strip_description_emoji: true,
            forward_alert_labels: false,
        }
    }
}

/// Normalized notification, built fresh for every inbound alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    pub alert_name: String,
    pub trigger: String,
    pub severity_level: String,
    pub summary: String,
    pub description: String,
    pub grafana: Option<String>,
    /// Inbound labels carried over when label forwarding is on.
    pub extra_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Transformer {
    options: TransformOptions,
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Self {
        Self { options }
    }

    pub fn transform(&self, alert: &AlertManagerAlert) -> OutboundNotification {
        let alert_name = alert.label("alertname").unwrap_or(UNKNOWN_ALERT_NAME);
        let severity = alert.label("severity").unwrap_or(DEFAULT_SEVERITY);

        let mut trigger = alert_name.to_string();
        let mut summary = alert.annotation("summary").unwrap_or(alert_name).to_string();

        if alert.is_resolved() {
            trigger.push_str(RESOLVED_TRIGGER_SUFFIX);
            if self.options.resolved_summary_prefix && !mentions_resolved(&summary) {
                summary.insert_str(0, RESOLVED_SUMMARY_PREFIX);
            }
        }

        let grafana = if self.options.grafana_label {
            alert
                .annotation("dashboard")
                .or_else(|| Some(alert.generator_url.as_str()).filter(|u| !u.is_empty()))
                .map(str::to_string)
        } else {
            None
        };

        let extra_labels = if self.options.forward_alert_labels {
            alert
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };

        OutboundNotification {
            alert_name: alert_name.to_string(),
            trigger,
            severity_level: map_severity_to_level(severity).to_string(),
            summary,
            description: self.build_description(alert),
            grafana,
            extra_labels,
        }
    }

    /// Joins description, dashboard and generator URL, in that order, with a
    /// blank line between the parts that are present.
    pub fn build_description(&self, alert: &AlertManagerAlert) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3);

        if let Some(description) = alert.annotation("description") {
            let description = if self.options.strip_description_emoji {
                remove_emojis(description)
            } else {
                description.to_string()
            };
            if !description.is_empty() {
                parts.push(description);
            }
        }
        if let Some(dashboard) = alert.annotation("dashboard") {
            parts.push(dashboard.to_string());
        }
        if !alert.generator_url.is_empty() {
            parts.push(alert.generator_url.clone());
        }

        if parts.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

/// Maps an AlertManager severity label onto Madison's 1-5 scale.
///
/// Closed table, case-insensitive: critical=1, warning=3, info=5. Anything
/// else is 5.
pub fn map_severity_to_level(severity: &str) -> &'static str {
    match severity.to_lowercase().as_str() {
        "critical" => "1",
        "warning" => "3",
        "info" => "5",
        _ => "5",
    }
}

fn mentions_resolved(summary: &str) -> bool {
    let lower = summary.to_lowercase();
    lower.contains("resolved") || lower.contains("решено")
}

fn remove_emojis(s: &str) -> String {
    s.chars()
        .filter(|c| !is_emoji(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F // emoticons
            | 0x1F300..=0x1F5FF // symbols and pictographs
            | 0x1F680..=0x1F6FF // transport and map
            | 0x1F1E0..=0x1F1FF // flags
            | 0x2600..=0x26FF
            | 0x2700..=0x27BF
            | 0xFE00..=0xFE0F // variation selectors
            | 0x1F900..=0x1F9FF
            | 0x1FA00..=0x1FA6F
            | 0x200D // zero width joiner
    )
}
