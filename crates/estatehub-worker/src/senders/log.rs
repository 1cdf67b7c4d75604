//! Sender that writes each message to the log instead of delivering it.

use async_trait::async_trait;

use estatehub_entity::recipient::Recipient;

use crate::dispatch::{DeliveryError, DeliveryReceipt, MessagePayload, NotificationSender};

/// Logs each message at info level and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        tracing::info!(
            template = %payload.template,
            role = %recipient.role,
            to = %recipient.email,
            subject = %payload.subject,
            "Notification"
        );
        Ok(DeliveryReceipt::default())
    }
}
