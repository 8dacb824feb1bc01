//! Microsoft Teams incoming webhook

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::DeployError;
use crate::notify::{format_message, NotificationSink};

/// Connector card payload
#[derive(Debug, Serialize)]
struct MessageCard<'a> {
    text: &'a str,
}

/// Posts failure messages to a Teams channel
pub struct TeamsNotifier {
    client: Client,
    webhook_url: SecretString,
    host_label: String,
}

impl TeamsNotifier {
    pub fn new(webhook_url: SecretString, host_label: impl Into<String>) -> Result<Self, DeployError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeployError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            webhook_url,
            host_label: host_label.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for TeamsNotifier {
    async fn notify(&self, context_label: &str, error_text: &str) -> Result<(), DeployError> {
        let text = format_message(&self.host_label, context_label, error_text);
        debug!("POST teams webhook ({})", context_label);

        let response = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&MessageCard { text: &text })
            .send()
            .await
            .map_err(|e| DeployError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Teams webhook failed: {} - {}", status, body);
            return Err(DeployError::Notification(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}
