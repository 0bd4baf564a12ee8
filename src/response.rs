//! Request and response values passed through the connection pipeline.

use reqwest::Method;
use serde::Serialize;

/// Parameters of a single request attempt.
///
/// `arguments` carries whatever the caller handed to the dispatch call; for
/// methods with a body the first argument is sent as the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub arguments: Vec<serde_json::Value>,
}

impl Request {
    /// Create a request without arguments.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            arguments: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn with_argument(mut self, argument: serde_json::Value) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Whether the method carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Header pairs in the order they were received. Repeated headers
    /// appear once per occurrence.
    pub headers: Vec<(String, String)>,

    /// Response body
    pub body: String,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Add a header pair, keeping any earlier occurrence.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Iterate header pairs in wire order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// 2xx or 3xx.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}
