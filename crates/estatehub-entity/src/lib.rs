//! # estatehub-entity
//!
//! Domain entity models for the EstateHub scheduler. Every struct in this
//! crate represents a database table row or a domain value object. All
//! entities derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! database entities additionally derive `sqlx::FromRow`.

pub mod meeting;
pub mod recipient;
pub mod reminder;
pub mod window;

pub use meeting::{Meeting, MeetingStatus};
pub use recipient::{Recipient, RecipientRole};
pub use reminder::ReminderKind;
pub use window::TimeWindow;
