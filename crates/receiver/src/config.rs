use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::transform::TransformOptions;

pub const DEFAULT_MADISON_URL: &str = "https://madison.flant.com/api/events/custom/%s";
pub const DEFAULT_DMS: &str = "AlertReceiver";
pub const DEFAULT_PORT: u16 = 80;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

const API_KEY_PLACEHOLDER: &str = "%s";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: MADISON_API_KEY")]
    MissingApiKey,
    #[error("failed to read config file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid MADISON_URL template: {0}")]
    UrlTemplate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Immutable service configuration, built once at startup.
#[derive(Clone)]
pub struct Config {
    pub madison_api_key: String,
    /// Endpoint template; `%s` is replaced with the API key.
    pub madison_url: String,
    /// Dead-man's-switch channel name.
    pub dms: String,
    pub port: u16,
    pub transform: TransformOptions,
    pub log_format: LogFormat,
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Config {
    /// Loads the optional dotenv file, then reads the process environment.
    ///
    /// Variables already present in the environment win over the file. A
    /// missing file is fine; an unreadable one is not.
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        Self::load_with(env_file, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading keys through `lookup` once the dotenv
    /// file has been applied to the process environment.
    pub fn load_with<F>(env_file: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match dotenvy::from_path(env_file) {
            Ok(()) => {}
            Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ConfigError::EnvFile {
                    path: env_file.to_path_buf(),
                    source,
                })
            }
        }

        Self::from_lookup(lookup)
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let madison_api_key = get("MADISON_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let madison_url = get("MADISON_URL").unwrap_or_else(|| DEFAULT_MADISON_URL.to_string());
        validate_url_template(&madison_url, &madison_api_key)?;

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let defaults = TransformOptions::default();
        let transform = TransformOptions {
            resolved_summary_prefix: flag(
                "RESOLVED_SUMMARY_PREFIX",
                get("RESOLVED_SUMMARY_PREFIX"),
                defaults.resolved_summary_prefix,
            )?,
            grafana_label: flag("GRAFANA_LABEL", get("GRAFANA_LABEL"), defaults.grafana_label)?,
            strip_description_emoji: flag(
                "STRIP_DESCRIPTION_EMOJI",
                get("STRIP_DESCRIPTION_EMOJI"),
                defaults.strip_description_emoji,
            )?,
            forward_alert_labels: flag(
                "FORWARD_ALERT_LABELS",
                get("FORWARD_ALERT_LABELS"),
                defaults.forward_alert_labels,
            )?,
        };

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => match raw.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => return Err(ConfigError::Invalid { key: "LOG_FORMAT", value: raw }),
            },
        };

        Ok(Config {
            madison_api_key,
            madison_url,
            dms: get("DMS").unwrap_or_else(|| DEFAULT_DMS.to_string()),
            port,
            transform,
            log_format,
            request_timeout: REQUEST_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        })
    }

    /// Upstream URL with the API key substituted.
    pub fn madison_endpoint(&self) -> String {
        render_url(&self.madison_url, &self.madison_api_key)
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

// The API key is a secret; keep it out of `{:?}` output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("madison_api_key", &"<redacted>")
            .field("madison_url", &self.madison_url)
            .field("dms", &self.dms)
            .field("port", &self.port)
            .field("transform", &self.transform)
            .field("log_format", &self.log_format)
            .field("request_timeout", &self.request_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish()
    }
}

fn render_url(template: &str, api_key: &str) -> String {
    template.replacen(API_KEY_PLACEHOLDER, api_key, 1)
}

fn validate_url_template(template: &str, api_key: &str) -> Result<(), ConfigError> {
    match template.matches(API_KEY_PLACEHOLDER).count() {
        1 => {}
        0 => return Err(ConfigError::UrlTemplate("missing %s placeholder".to_string())),
        _ => return Err(ConfigError::UrlTemplate("more than one %s placeholder".to_string())),
    }
    Url::parse(&render_url(template, api_key))
        .map(|_| ())
        .map_err(|e| ConfigError::UrlTemplate(e.to_string()))
}

fn flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("MADISON_API_KEY", "abc123")]).unwrap();
        assert_eq!(config.madison_url, DEFAULT_MADISON_URL);
        assert_eq!(config.dms, "AlertReceiver");
        assert_eq!(config.port, 80);
        assert_eq!(config.transform, TransformOptions::default());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(
            config.madison_endpoint(),
            "https://madison.flant.com/api/events/custom/abc123"
        );
        assert_eq!(config.listen_addr(), "0.0.0.0:80");
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        assert!(matches!(config_from(&[]), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "")]),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("MADISON_API_KEY", "k"),
            ("MADISON_URL", "http://localhost:9000/events/%s"),
            ("DMS", "staging-receiver"),
            ("PORT", "8080"),
            ("RESOLVED_SUMMARY_PREFIX", "off"),
            ("GRAFANA_LABEL", "false"),
            ("STRIP_DESCRIPTION_EMOJI", "0"),
            ("FORWARD_ALERT_LABELS", "Yes"),
            ("LOG_FORMAT", "TEXT"),
        ])
        .unwrap();

        assert_eq!(config.madison_endpoint(), "http://localhost:9000/events/k");
        assert_eq!(config.dms, "staging-receiver");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.transform,
            TransformOptions {
                resolved_summary_prefix: false,
                grafana_label: false,
                strip_description_emoji: false,
                forward_alert_labels: true,
            }
        );
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "k"), ("PORT", "http")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "k"), ("GRAFANA_LABEL", "maybe")]),
            Err(ConfigError::Invalid { key: "GRAFANA_LABEL", .. })
        ));
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "k"), ("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { key: "LOG_FORMAT", .. })
        ));
    }

    #[test]
    fn test_url_template_validation() {
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "k"), ("MADISON_URL", "https://madison/api")]),
            Err(ConfigError::UrlTemplate(_))
        ));
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "k"), ("MADISON_URL", "%s/%s")]),
            Err(ConfigError::UrlTemplate(_))
        ));
        assert!(matches!(
            config_from(&[("MADISON_API_KEY", "k"), ("MADISON_URL", "not a url %s")]),
            Err(ConfigError::UrlTemplate(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = config_from(&[("MADISON_API_KEY", "super-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    fn lookup_with_key(key: &str) -> Option<String> {
        (key == "MADISON_API_KEY").then(|| "abc123".to_string())
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let path = std::env::temp_dir().join("alertreceiver-does-not-exist.env");
        assert!(!path.exists());

        let config = Config::load_with(&path, lookup_with_key).unwrap();
        assert_eq!(config.madison_api_key, "abc123");
        assert_eq!(config.dms, DEFAULT_DMS);
    }

    #[test]
    fn test_unreadable_env_file_is_fatal() {
        // A directory opens but cannot be read as a dotenv file.
        let path = std::env::temp_dir();
        let err = Config::load_with(&path, lookup_with_key).unwrap_err();
        match err {
            ConfigError::EnvFile { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected EnvFile error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_file_is_applied_to_the_environment() {
        let dir = std::env::temp_dir().join(format!("alertreceiver-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        std::fs::write(&path, "ALERTRECEIVER_TEST_DMS=from-file\n").unwrap();

        let config = Config::load_with(&path, |key| match key {
            "DMS" => std::env::var("ALERTRECEIVER_TEST_DMS").ok(),
            other => lookup_with_key(other),
        })
        .unwrap();
        assert_eq!(config.dms, "from-file");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
