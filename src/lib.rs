//! Shopify API Notifier
//!
//! Wraps the request entry point of an HTTP API client with cross-cutting
//! observability.
//!
//! # Features
//!
//! - **Response Capture**: the last response is kept on the connection
//! - **Request Events**: one `request.detailed` event per observed response
//! - **Deprecation Alerts**: `X-Shopify-API-Deprecated-Reason` headers are
//!   written to stderr and posted to a Slack webhook
//! - **Usage Tracking**: Prometheus metrics for requests and alerts
//!
//! # Example Configuration
//!
//! ```yaml
//! connection:
//!   base_url: https://example.myshopify.com/admin/api/2024-01
//!   timeout_secs: 30
//! alert:
//!   webhook_url: https://hooks.slack.com/services/T000/B000/XXX
//!   channel: "#deprecated-api"
//!   username: notifier
//! ```

pub mod alert;
pub mod config;
pub mod connection;
pub mod deprecation;
pub mod error;
pub mod events;
pub mod metrics;
pub mod response;
pub mod transport;

pub use config::NotifierConfig;
pub use connection::Connection;
pub use error::{AlertError, RequestError};
pub use response::{Request, Response};
