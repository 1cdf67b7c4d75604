//! EstateHub scheduler entry point.

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{EnvFilter, fmt};

use estatehub_core::config::AppConfig;
use estatehub_core::error::AppError;
use estatehub_database::{DatabasePool, MeetingRepository, MeetingStore};
use estatehub_worker::dispatch::NotificationDispatcher;
use estatehub_worker::{
    CronTickSource, JobExecutor, JobRegistry, JobRunner, Scheduler, TracingObserver,
    register_default_jobs, senders,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Scheduler error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("ESTATEHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize the tracing subscriber
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main scheduler run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting EstateHub scheduler v{}", env!("CARGO_PKG_VERSION"));

    if !config.scheduler.enabled {
        tracing::warn!("Scheduler disabled by configuration, exiting");
        return Ok(());
    }

    let db = DatabasePool::open(&config.database).await?;
    db.ping().await?;
    let store: Arc<dyn MeetingStore> = Arc::new(MeetingRepository::new(db.pool().clone()));

    let sender = senders::from_config(&config.notifications)?;
    tracing::info!(sender = ?config.notifications.sender, "Notification sender ready");
    let dispatcher = NotificationDispatcher::new(
        sender,
        config.notifications.send_timeout(),
        config.reminders.utc_offset()?,
    );

    let registry = Arc::new(JobRegistry::new());
    register_default_jobs(&registry, &config.reminders, store, dispatcher, Utc::now())?;

    let runner = Arc::new(JobRunner::new(
        Arc::clone(&registry),
        Arc::new(JobExecutor::new(config.scheduler.handler_timeout())),
        Arc::new(TracingObserver),
    ));
    let source = CronTickSource::new(config.scheduler.tick_expression.clone());
    let mut scheduler = Scheduler::new(runner, Box::new(source), config.scheduler.clone());

    scheduler.start().await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    let drained = scheduler.stop().await?;
    if !drained {
        tracing::warn!("Some jobs were still running at shutdown");
    }

    db.close().await;
    tracing::info!("EstateHub scheduler stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
