//! Alert delivery to a Slack-compatible incoming webhook.

use crate::config::AlertConfig;
use crate::error::AlertError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// A channel that can deliver a plain text message.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn ping(&self, text: &str) -> Result<(), AlertError>;
}

/// Webhook client posting to a fixed channel under a fixed sender name.
pub struct SlackNotifier {
    client: reqwest::Client,
    config: AlertConfig,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
    channel: &'a str,
    username: &'a str,
}

impl SlackNotifier {
    pub fn new(config: AlertConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl AlertChannel for SlackNotifier {
    async fn ping(&self, text: &str) -> Result<(), AlertError> {
        let url = self
            .config
            .webhook_url
            .as_deref()
            .ok_or(AlertError::NotConfigured)?;

        let message = WebhookMessage {
            text,
            channel: &self.config.channel,
            username: &self.config.username,
        };

        let response = self.client.post(url).json(&message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(channel = %self.config.channel, "Alert delivered");
        Ok(())
    }
}

/// Collapse every run of spaces into a single space. Newlines are kept.
pub fn squeeze_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !previous_space {
                out.push(c);
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}
