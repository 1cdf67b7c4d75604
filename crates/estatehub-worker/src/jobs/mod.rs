//! Built-in job handler implementations.

pub mod reminder;
pub mod status;

pub use reminder::{ReminderJob, WindowPolicy};
pub use status::StatusUpdateJob;
