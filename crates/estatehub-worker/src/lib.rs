//! Background job scheduling for EstateHub.
//!
//! This crate provides:
//! - Tick sources that wake the scheduler up
//! - A job registry with per-job schedules and concurrency policies
//! - A job runner that invokes due handlers under a timeout
//! - Notification dispatch with pluggable senders
//! - The meeting reminder and status update jobs

pub mod clock;
pub mod dispatch;
pub mod executor;
pub mod jobs;
pub mod registry;
pub mod report;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod senders;

pub use clock::{CronTickSource, ManualTickSource, TickEvent, TickSource};
pub use dispatch::{NotificationDispatcher, NotificationSender};
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use registry::{ConcurrencyPolicy, JobDefinition, JobRegistry, RegistryError};
pub use report::{JobRunResult, RunObserver, TracingObserver};
pub use runner::{JobRunner, TickReport};
pub use schedule::ScheduleSpec;
pub use scheduler::{Scheduler, register_default_jobs};
