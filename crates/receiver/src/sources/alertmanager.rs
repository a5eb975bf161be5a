use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// AlertManager webhook payload (version 4 of the webhook format).
///
/// Every field is optional on the wire; absent or `null` fields decode to
/// empty values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertManagerWebhook {
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(rename = "groupKey", deserialize_with = "null_as_default")]
    pub group_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub receiver: String,
    #[serde(rename = "groupLabels", deserialize_with = "null_as_default")]
    pub group_labels: HashMap<String, String>,
    #[serde(rename = "commonLabels", deserialize_with = "null_as_default")]
    pub common_labels: HashMap<String, String>,
    #[serde(rename = "commonAnnotations", deserialize_with = "null_as_default")]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL", deserialize_with = "null_as_default")]
    pub external_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub alerts: Vec<AlertManagerAlert>,
}

/// A single alert inside a webhook delivery.
///
/// Timestamps are carried as the raw strings AlertManager sent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertManagerAlert {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub annotations: HashMap<String, String>,
    #[serde(rename = "startsAt", deserialize_with = "null_as_default")]
    pub starts_at: String,
    #[serde(rename = "endsAt", deserialize_with = "null_as_default")]
    pub ends_at: String,
    #[serde(rename = "generatorURL", deserialize_with = "null_as_default")]
    pub generator_url: String,
}

impl AlertManagerAlert {
    /// Label value, treating an empty string the same as a missing key.
    pub fn label(&self, key: &str) -> Option<&str> {
        non_empty(self.labels.get(key))
    }

    /// Annotation value, treating an empty string the same as a missing key.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        non_empty(self.annotations.get(key))
    }

    pub fn is_resolved(&self) -> bool {
        self.status == "resolved"
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}
