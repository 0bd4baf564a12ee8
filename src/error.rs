//! Error types for request dispatch and alert delivery.

use crate::response::Response;
use thiserror::Error;

/// Failure of a request attempt.
///
/// Only [`RequestError::Status`] carries the server's response; every other
/// variant is a failure that happened before a response existed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("request failed with status {}", .response.status)]
    Status { response: Response },
}

impl RequestError {
    /// The response associated with this failure, if the server answered.
    pub fn response(&self) -> Option<&Response> {
        match self {
            RequestError::Status { response } => Some(response),
            RequestError::Connection(_)
            | RequestError::Timeout(_)
            | RequestError::InvalidUrl(_)
            | RequestError::Encode(_) => None,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout(err.to_string())
        } else if err.is_builder() {
            RequestError::InvalidUrl(err.to_string())
        } else {
            RequestError::Connection(err.to_string())
        }
    }
}

/// Failure to deliver an alert.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert webhook url is not configured")]
    NotConfigured,

    #[error("alert delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("alert webhook rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
