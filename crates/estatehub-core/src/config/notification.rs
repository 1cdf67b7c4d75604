//! Outbound notification configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which delivery backend reminder messages go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// Write messages to the log only.
    Log,
    /// POST messages as JSON to a relay endpoint.
    Webhook,
}

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Delivery backend.
    #[serde(default = "default_sender")]
    pub sender: SenderKind,
    /// Relay endpoint for the webhook sender.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Optional bearer token sent to the relay.
    #[serde(default)]
    pub webhook_token: Option<String>,
    /// Per-recipient send timeout in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
}

impl NotificationConfig {
    /// Per-recipient send timeout as a [`Duration`].
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            webhook_url: None,
            webhook_token: None,
            send_timeout_seconds: default_send_timeout(),
        }
    }
}

fn default_sender() -> SenderKind {
    SenderKind::Log
}

fn default_send_timeout() -> u64 {
    15
}
