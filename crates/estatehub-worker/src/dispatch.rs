//! Reminder fan-out: one message per recipient, each delivered independently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use estatehub_entity::meeting::Meeting;
use estatehub_entity::recipient::{Recipient, RecipientRole};
use estatehub_entity::reminder::ReminderKind;

/// Error from a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Might succeed if tried again later.
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// Will not succeed without changing the message or recipient.
    #[error("Permanent delivery failure: {0}")]
    Permanent(String),

    /// The sender did not answer in time.
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Acknowledgement from a sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Identifier assigned by the downstream provider, if any.
    pub provider_id: Option<String>,
}

/// A rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Template identifier.
    pub template: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Structured fields for template-aware senders.
    pub data: serde_json::Value,
}

/// Delivers rendered messages to recipients.
#[async_trait]
pub trait NotificationSender: Send + Sync + std::fmt::Debug {
    /// Deliver `payload` to `recipient`.
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Build the flat recipient list for a meeting.
///
/// Company, agent, then customer. Contacts without an email are left out,
/// and an address shared by several roles is kept only for the first.
pub fn resolve_recipients(meeting: &Meeting) -> Vec<Recipient> {
    let candidates = [
        (RecipientRole::Company, &meeting.agency_name, &meeting.agency_email),
        (RecipientRole::Agent, &meeting.agent_name, &meeting.agent_email),
        (RecipientRole::Customer, &meeting.customer_name, &meeting.customer_email),
    ];

    let mut recipients: Vec<Recipient> = Vec::with_capacity(candidates.len());
    for (role, name, email) in candidates {
        let Some(email) = email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
            continue;
        };
        if recipients.iter().any(|r| r.email.eq_ignore_ascii_case(email)) {
            continue;
        }
        recipients.push(Recipient {
            role,
            name: name.clone(),
            email: email.to_string(),
        });
    }
    recipients
}

/// Render the reminder for one recipient. Times are shown in `offset`.
pub fn render(
    meeting: &Meeting,
    kind: ReminderKind,
    recipient: &Recipient,
    offset: FixedOffset,
) -> MessagePayload {
    let local = meeting.scheduled_at.with_timezone(&offset);
    let when = local.format("%Y-%m-%d %H:%M").to_string();
    let time = local.format("%H:%M").to_string();

    let subject = match kind {
        ReminderKind::Day => format!("Reminder: {} today at {}", meeting.title, time),
        ReminderKind::Hour => format!("Starting soon: {} at {}", meeting.title, time),
    };

    let counterpart = match recipient.role {
        RecipientRole::Customer => format!("{} from {}", meeting.agent_name, meeting.agency_name),
        RecipientRole::Agent | RecipientRole::Company => meeting.customer_name.clone(),
    };
    let mut body = format!(
        "Hello {},\n\nThis is a reminder of your meeting \"{}\" with {} on {}.",
        recipient.name, meeting.title, counterpart, when
    );
    if let Some(address) = &meeting.property_address {
        body.push_str(&format!("\nLocation: {}", address));
    }

    MessagePayload {
        template: kind.template().to_string(),
        subject,
        body,
        data: serde_json::json!({
            "meeting_id": meeting.id,
            "title": meeting.title,
            "scheduled_at": meeting.scheduled_at,
            "local_time": when,
            "duration_minutes": meeting.duration_minutes,
            "property_address": meeting.property_address,
            "agency_name": meeting.agency_name,
            "agent_name": meeting.agent_name,
            "customer_name": meeting.customer_name,
            "recipient_role": recipient.role,
            "reminder": kind,
        }),
    }
}

/// Outcome of sending to one recipient.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// Who the message was for.
    pub recipient: Recipient,
    /// What the sender returned.
    pub result: Result<DeliveryReceipt, DeliveryError>,
}

/// Outcome of sending one reminder to every recipient of a meeting.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// One entry per resolved recipient, in resolution order.
    pub attempts: Vec<DeliveryAttempt>,
}

impl DispatchReport {
    /// Number of successful deliveries.
    pub fn delivered(&self) -> usize {
        self.attempts.iter().filter(|a| a.result.is_ok()).count()
    }

    /// Failed attempts.
    pub fn failures(&self) -> impl Iterator<Item = (&Recipient, &DeliveryError)> {
        self.attempts
            .iter()
            .filter_map(|a| a.result.as_ref().err().map(|e| (&a.recipient, e)))
    }

    /// Whether every attempt succeeded (vacuously true with no recipients).
    pub fn is_complete(&self) -> bool {
        self.attempts.iter().all(|a| a.result.is_ok())
    }
}

/// Fans a reminder out to a meeting's recipients through one sender.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    send_timeout: Duration,
    offset: FixedOffset,
}

impl NotificationDispatcher {
    /// Create a dispatcher. Each send is bounded by `send_timeout`.
    pub fn new(sender: Arc<dyn NotificationSender>, send_timeout: Duration, offset: FixedOffset) -> Self {
        Self {
            sender,
            send_timeout,
            offset,
        }
    }

    /// Send the `kind` reminder for `meeting` to all its recipients.
    ///
    /// Sends run concurrently. A failed send is logged and recorded; it never
    /// stops the others and is not retried.
    pub async fn dispatch(&self, meeting: &Meeting, kind: ReminderKind) -> DispatchReport {
        let recipients = resolve_recipients(meeting);
        if recipients.is_empty() {
            tracing::warn!(meeting_id = %meeting.id, reminder = %kind, "Meeting has no reachable recipients");
            return DispatchReport::default();
        }

        let sends = recipients.into_iter().map(move |recipient| async move {
            let payload = render(meeting, kind, &recipient, self.offset);
            let result = match tokio::time::timeout(
                self.send_timeout,
                self.sender.send(&recipient, &payload),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout(self.send_timeout)),
            };

            match &result {
                Ok(receipt) => tracing::debug!(
                    meeting_id = %meeting.id,
                    reminder = %kind,
                    role = %recipient.role,
                    provider_id = ?receipt.provider_id,
                    "Reminder delivered"
                ),
                Err(e) => tracing::warn!(
                    meeting_id = %meeting.id,
                    reminder = %kind,
                    role = %recipient.role,
                    error = %e,
                    "Reminder delivery failed"
                ),
            }

            DeliveryAttempt { recipient, result }
        });

        DispatchReport {
            attempts: join_all(sends).await,
        }
    }
}
