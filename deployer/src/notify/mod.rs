//! Operator notifications

pub mod teams;

use async_trait::async_trait;
use tracing::error;

use crate::errors::DeployError;

/// Operator-facing failure channel
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a failure message, once, with no retry
    async fn notify(&self, context_label: &str, error_text: &str) -> Result<(), DeployError>;
}

/// Sink used when no webhook is configured: the message only goes to the log
#[derive(Debug, Clone)]
pub struct LogNotifier {
    host_label: String,
}

impl LogNotifier {
    pub fn new(host_label: impl Into<String>) -> Self {
        Self {
            host_label: host_label.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, context_label: &str, error_text: &str) -> Result<(), DeployError> {
        error!("{}", format_message(&self.host_label, context_label, error_text));
        Ok(())
    }
}

/// Message layout shared by every sink
pub fn format_message(host_label: &str, context_label: &str, error_text: &str) -> String {
    format!("{} - {}: \n{}", host_label, context_label, error_text)
}
