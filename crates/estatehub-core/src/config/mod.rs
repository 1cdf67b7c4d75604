//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod notification;
pub mod reminder;
pub mod scheduler;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::notification::{NotificationConfig, SenderKind};
pub use self::reminder::ReminderConfig;
pub use self::scheduler::SchedulerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Tick source and runner settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Meeting job schedules and windows.
    #[serde(default)]
    pub reminders: ReminderConfig,
    /// Notification delivery settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ESTATEHUB__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ESTATEHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.scheduler.handler_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler.handler_timeout_seconds must be greater than zero",
            ));
        }
        if self.scheduler.tick_buffer == 0 {
            return Err(AppError::configuration(
                "scheduler.tick_buffer must be greater than zero",
            ));
        }
        if self.reminders.hour_reminder_interval_minutes == 0 {
            return Err(AppError::configuration(
                "reminders.hour_reminder_interval_minutes must be greater than zero",
            ));
        }
        if self.reminders.hour_lookahead_minutes == 0 {
            return Err(AppError::configuration(
                "reminders.hour_lookahead_minutes must be greater than zero",
            ));
        }
        if self.reminders.status_update_interval_seconds == 0 {
            return Err(AppError::configuration(
                "reminders.status_update_interval_seconds must be greater than zero",
            ));
        }
        self.reminders.utc_offset()?;

        if self.reminders.hour_lookahead_minutes < self.reminders.hour_reminder_interval_minutes {
            tracing::warn!(
                lookahead_minutes = self.reminders.hour_lookahead_minutes,
                interval_minutes = self.reminders.hour_reminder_interval_minutes,
                "Hour reminder lookahead is shorter than its scan interval; some meetings will never be reminded"
            );
        }

        if self.notifications.sender == SenderKind::Webhook
            && self.notifications.webhook_url.as_deref().unwrap_or("").is_empty()
        {
            return Err(AppError::configuration(
                "notifications.webhook_url is required when sender = \"webhook\"",
            ));
        }

        Ok(())
    }
}
