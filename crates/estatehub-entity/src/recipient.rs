//! Notification recipients derived from a meeting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The part a recipient plays in a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientRole {
    /// The agency (company) contact.
    Company,
    /// The agent assigned to the meeting.
    Agent,
    /// The customer attending the meeting.
    Customer,
}

impl RecipientRole {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Agent => "agent",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single addressee of a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Role in the meeting.
    pub role: RecipientRole,
    /// Display name.
    pub name: String,
    /// Delivery address.
    pub email: String,
}
