//! Scheduler runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tick source and job runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression driving the heartbeat tick.
    #[serde(default = "default_tick_expression")]
    pub tick_expression: String,
    /// Default per-invocation handler timeout in seconds.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: u64,
    /// How long `stop` waits for in-flight handlers, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Capacity of the tick channel between the clock and the runner.
    #[serde(default = "default_tick_buffer")]
    pub tick_buffer: usize,
}

impl SchedulerConfig {
    /// Default handler timeout as a [`Duration`].
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tick_expression: default_tick_expression(),
            handler_timeout_seconds: default_handler_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
            tick_buffer: default_tick_buffer(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_expression() -> String {
    "* * * * * *".to_string()
}

fn default_handler_timeout() -> u64 {
    120
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_tick_buffer() -> usize {
    16
}
