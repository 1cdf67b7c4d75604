//! Notification sender implementations.

pub mod log;
pub mod webhook;

use std::sync::Arc;

use estatehub_core::config::{NotificationConfig, SenderKind};
use estatehub_core::error::AppError;

use crate::dispatch::NotificationSender;

pub use self::log::LogSender;
pub use self::webhook::WebhookSender;

/// Build the sender selected by `config.sender`.
pub fn from_config(config: &NotificationConfig) -> Result<Arc<dyn NotificationSender>, AppError> {
    match config.sender {
        SenderKind::Log => Ok(Arc::new(LogSender)),
        SenderKind::Webhook => {
            let url = config.webhook_url.clone().ok_or_else(|| {
                AppError::configuration("notifications.webhook_url is required for the webhook sender")
            })?;
            Ok(Arc::new(WebhookSender::new(
                url,
                config.webhook_token.clone(),
                config.send_timeout(),
            )?))
        }
    }
}
