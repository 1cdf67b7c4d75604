//! Sender that POSTs each message as JSON to an HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use estatehub_core::error::{AppError, ErrorKind};
use estatehub_entity::recipient::Recipient;

use crate::dispatch::{DeliveryError, DeliveryReceipt, MessagePayload, NotificationSender};

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    recipient: &'a Recipient,
    template: &'a str,
    subject: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookAck {
    #[serde(default)]
    id: Option<String>,
}

/// Delivers messages to a mail/push relay over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl WebhookSender {
    /// Create a sender posting to `url`, with an optional bearer token.
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build webhook HTTP client", e)
            })?;

        Ok(Self {
            client,
            url: url.into(),
            token,
            timeout,
        })
    }
}

/// Map a non-success HTTP status to a delivery error.
///
/// Request timeouts, rate limiting and server errors are transient; any
/// other client error is permanent.
pub fn classify_status(status: StatusCode) -> DeliveryError {
    let message = format!("Webhook responded with {}", status);
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        DeliveryError::Transient(message)
    } else {
        DeliveryError::Permanent(message)
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let body = WebhookBody {
            recipient,
            template: &payload.template,
            subject: &payload.subject,
            body: &payload.body,
            data: &payload.data,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout(self.timeout)
            } else {
                DeliveryError::Transient(format!("Webhook request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let ack = response.json::<WebhookAck>().await.unwrap_or_default();
        Ok(DeliveryReceipt { provider_id: ack.id })
    }
}
