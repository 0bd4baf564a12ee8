//! Configuration for the notifying connection.
//!
//! Defines the target API, the alert webhook, the deprecation marker and
//! metrics options.

use reqwest::header::HeaderName;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    /// Target API connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Alert webhook
    #[serde(default)]
    pub alert: AlertConfig,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NotifierConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.connection.validate()?;
        self.alert.validate()?;
        self.settings.validate()?;
        Ok(())
    }
}

/// Connection to the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Base URL that request paths are joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ConnectionConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if let Err(e) = Url::parse(&self.base_url) {
            anyhow::bail!("Invalid base_url '{}': {}", self.base_url, e);
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/admin".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("shopify-api-notifier/{}", env!("CARGO_PKG_VERSION"))
}

/// Slack-compatible webhook used for deprecation alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    /// Incoming webhook URL. Alerts fail with `NotConfigured` when absent.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Channel the alert is posted to
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Sender name shown on the alert
    #[serde(default = "default_username")]
    pub username: String,
}

impl AlertConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = &self.webhook_url {
            if let Err(e) = Url::parse(url) {
                anyhow::bail!("Invalid alert webhook_url: {}", e);
            }
        }
        if self.channel.is_empty() {
            anyhow::bail!("Alert channel cannot be empty");
        }
        Ok(())
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            channel: default_channel(),
            username: default_username(),
        }
    }
}

fn default_channel() -> String {
    "#deprecated-api".to_string()
}

fn default_username() -> String {
    "notifier".to_string()
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Response header that marks a deprecated call (matched case-insensitively)
    #[serde(default = "default_marker_header")]
    pub marker_header: String,

    /// Category name of the per-request event
    #[serde(default = "default_event_name")]
    pub event_name: String,

    /// Whether to log every emitted request event
    #[serde(default = "default_true")]
    pub log_events: bool,
}

impl GlobalSettings {
    fn validate(&self) -> anyhow::Result<()> {
        if self.marker_header.is_empty() {
            anyhow::bail!("marker_header cannot be empty");
        }
        if HeaderName::from_bytes(self.marker_header.as_bytes()).is_err() {
            anyhow::bail!("marker_header '{}' is not a valid header name", self.marker_header);
        }
        if self.event_name.is_empty() {
            anyhow::bail!("event_name cannot be empty");
        }
        Ok(())
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            marker_header: default_marker_header(),
            event_name: default_event_name(),
            log_events: true,
        }
    }
}

fn default_marker_header() -> String {
    crate::deprecation::DEPRECATION_MARKER.to_string()
}

fn default_event_name() -> String {
    crate::events::REQUEST_EVENT.to_string()
}

fn default_true() -> bool {
    true
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to collect Prometheus metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix for metric names
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_metrics_prefix(),
        }
    }
}

fn default_metrics_prefix() -> String {
    "shopify_api".to_string()
}
