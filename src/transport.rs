//! Request transport.
//!
//! A transport sends a request and reads back the raw reply
//! ([`Transport::execute`]), then turns that reply into a result
//! ([`Transport::handle_response`]). The caller runs the two steps in that
//! order, so the second step can be hooked on its own.

use crate::config::ConnectionConfig;
use crate::error::RequestError;
use crate::response::{Request, Response};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the raw response for any status.
    /// Fails only when no response was received.
    async fn execute(&self, request: &Request) -> Result<Response, RequestError>;

    /// Turn a raw response into a result. Statuses outside 2xx/3xx become a
    /// [`RequestError::Status`] carrying the response.
    fn handle_response(&self, response: Response) -> Result<Response, RequestError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(RequestError::Status { response })
        }
    }
}

/// Transport over `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport from connection settings.
    pub fn new(config: &ConnectionConfig) -> Result<Self, RequestError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Join a request path onto the base URL, keeping the base path prefix.
    pub fn url_for(&self, path: &str) -> Result<Url, RequestError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path)).map_err(|e| RequestError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Response, RequestError> {
        let url = self.url_for(&request.path)?;
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self.client.request(request.method.clone(), url);
        if request.has_body() {
            if let Some(body) = request.arguments.first() {
                let body =
                    serde_json::to_vec(body).map_err(|e| RequestError::Encode(e.to_string()))?;
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body);
            }
        }

        let reply = builder.send().await?;
        let status = reply.status().as_u16();
        let headers = reply
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = reply.text().await?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
