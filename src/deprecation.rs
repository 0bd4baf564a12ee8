//! Detection of deprecated API usage from response headers.
//!
//! Every response header whose name matches the marker (ASCII
//! case-insensitive) produces one console warning followed by one alert.
//! Alert failures are logged and counted; they never reach the caller.

use crate::alert::{squeeze_spaces, AlertChannel};
use crate::metrics::ConnectionMetrics;
use crate::response::Response;
use reqwest::Method;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, warn};

/// Header the API sets when a call relies on deprecated behaviour.
pub const DEPRECATION_MARKER: &str = "x-shopify-api-deprecated-reason";

/// Operator-facing output for warnings.
pub trait Console: Send + Sync {
    fn warn(&self, message: &str);
}

/// Writes warnings verbatim to stderr.
pub struct StderrConsole;

impl Console for StderrConsole {
    fn warn(&self, message: &str) {
        let mut stderr = io::stderr().lock();
        if let Err(e) = stderr.write_all(message.as_bytes()).and_then(|()| stderr.flush()) {
            error!(error = %e, "Failed to write deprecation warning to stderr");
        }
    }
}

/// A single deprecation marker found on a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationWarning {
    pub method: Method,
    pub path: String,
    pub header_name: String,
    pub header_value: String,
}

impl DeprecationWarning {
    /// Alert body: the warning plus the request arguments, spaces squeezed.
    pub fn alert_text(&self, arguments: &[serde_json::Value]) -> String {
        let rendered = serde_json::to_string(arguments).unwrap_or_else(|_| "[]".to_string());
        let text = format!(
            "*Message*\n{}\n*Arguments*\n```\n{}\n```\n",
            self, rendered
        );
        squeeze_spaces(&text)
    }
}

impl fmt::Display for DeprecationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[DEPRECATED] ShopifyAPI made a call to {} {}, and this call made",
            self.method, self.path
        )?;
        writeln!(
            f,
            "use of a deprecated endpoint, behaviour, or parameter. See {}: {} for more details.",
            self.header_name, self.header_value
        )
    }
}

/// Scans responses for the deprecation marker and raises alerts.
pub struct DeprecationDetector {
    marker: String,
    console: Arc<dyn Console>,
    alerts: Arc<dyn AlertChannel>,
    metrics: Option<Arc<ConnectionMetrics>>,
}

impl DeprecationDetector {
    pub fn new(console: Arc<dyn Console>, alerts: Arc<dyn AlertChannel>) -> Self {
        Self {
            marker: DEPRECATION_MARKER.to_string(),
            console,
            alerts,
            metrics: None,
        }
    }

    /// Match a different marker header name.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ConnectionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// All marker occurrences on `response`, in header order.
    pub fn scan(&self, method: &Method, path: &str, response: &Response) -> Vec<DeprecationWarning> {
        response
            .headers()
            .filter(|(name, _)| name.eq_ignore_ascii_case(&self.marker))
            .map(|(name, value)| DeprecationWarning {
                method: method.clone(),
                path: path.to_string(),
                header_name: name.to_string(),
                header_value: value.to_string(),
            })
            .collect()
    }

    /// Warn and alert for every marker on `response`. Returns the number of
    /// warnings raised.
    pub async fn inspect(
        &self,
        method: &Method,
        path: &str,
        response: &Response,
        arguments: &[serde_json::Value],
    ) -> usize {
        let warnings = self.scan(method, path, response);

        for warning in &warnings {
            let message = warning.to_string();
            self.console.warn(&message);
            warn!(
                method = %warning.method,
                path = %warning.path,
                reason = %warning.header_value,
                "Deprecated API usage"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_deprecation(warning.method.as_str(), &warning.path);
            }

            let outcome = match self.alerts.ping(&warning.alert_text(arguments)).await {
                Ok(()) => "sent",
                Err(e) => {
                    error!(error = %e, path = %warning.path, "Failed to deliver deprecation alert");
                    "failed"
                }
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_alert(outcome);
            }
        }

        warnings.len()
    }
}
