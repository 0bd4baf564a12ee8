//! Metrics for dispatched requests and deprecation alerts.
//!
//! Provides Prometheus metrics for monitoring API usage through the connection.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// Metrics collector for the notifying connection.
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Registry for all metrics
    registry: Registry,

    /// Counter for dispatched requests by outcome status
    pub requests_total: IntCounterVec,

    /// Counter for responses carrying the deprecation marker
    pub deprecation_warnings_total: IntCounterVec,

    /// Counter for alert delivery attempts by outcome
    pub alerts_total: IntCounterVec,

    /// Histogram for request latency
    pub request_duration_seconds: HistogramVec,
}

impl ConnectionMetrics {
    /// Create a new metrics collector with the given prefix.
    pub fn new(prefix: &str) -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                format!("{}_requests_total", prefix),
                "Total number of dispatched API requests",
            ),
            &["method", "status"],
        )
        .expect("Failed to create requests_total metric");

        let deprecation_warnings_total = IntCounterVec::new(
            Opts::new(
                format!("{}_deprecation_warnings_total", prefix),
                "Total number of responses flagged as using deprecated API behaviour",
            ),
            &["method", "path"],
        )
        .expect("Failed to create deprecation_warnings_total metric");

        let alerts_total = IntCounterVec::new(
            Opts::new(
                format!("{}_alerts_total", prefix),
                "Total number of deprecation alert deliveries",
            ),
            &["outcome"],
        )
        .expect("Failed to create alerts_total metric");

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{}_request_duration_seconds", prefix),
                "Duration of dispatched API requests",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method"],
        )
        .expect("Failed to create request_duration_seconds metric");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("Failed to register requests_total");
        registry
            .register(Box::new(deprecation_warnings_total.clone()))
            .expect("Failed to register deprecation_warnings_total");
        registry
            .register(Box::new(alerts_total.clone()))
            .expect("Failed to register alerts_total");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("Failed to register request_duration_seconds");

        Self {
            registry,
            requests_total,
            deprecation_warnings_total,
            alerts_total,
            request_duration_seconds,
        }
    }

    /// Record a dispatched request. `status` is the HTTP status, or
    /// `"error"` when no response was received.
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[method, status])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    /// Record a response carrying the deprecation marker.
    pub fn record_deprecation(&self, method: &str, path: &str) {
        self.deprecation_warnings_total
            .with_label_values(&[method, path])
            .inc();
    }

    /// Record an alert delivery outcome (`sent` or `failed`).
    pub fn record_alert(&self, outcome: &str) {
        self.alerts_total.with_label_values(&[outcome]).inc();
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new("shopify_api")
    }
}
