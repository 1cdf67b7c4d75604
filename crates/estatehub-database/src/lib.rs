//! # estatehub-database
//!
//! PostgreSQL connection management, migrations, and the meeting stores
//! the scheduler jobs query through the [`MeetingStore`] trait.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::InMemoryMeetingStore;
pub use repositories::meeting::MeetingRepository;
pub use store::{DueQuery, MeetingStore};
