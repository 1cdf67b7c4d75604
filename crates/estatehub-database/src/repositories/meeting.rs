//! Meeting repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use estatehub_core::error::{AppError, ErrorKind};
use estatehub_core::result::AppResult;
use estatehub_entity::meeting::{CreateMeeting, Meeting, MeetingStatus};
use estatehub_entity::reminder::ReminderKind;

use crate::store::{DueQuery, MeetingStore};

/// Repository for meeting CRUD and the scheduler's windowed queries.
#[derive(Debug, Clone)]
pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    /// Create a new meeting repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a meeting by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Meeting>> {
        sqlx::query_as::<_, Meeting>("SELECT * FROM meetings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find meeting", e))
    }

    /// Create a new pending meeting.
    pub async fn create(&self, data: &CreateMeeting) -> AppResult<Meeting> {
        sqlx::query_as::<_, Meeting>(
            "INSERT INTO meetings (id, agency_id, title, property_address, agency_name, agency_email, \
             agent_name, agent_email, customer_name, customer_email, scheduled_at, duration_minutes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *"
        )
            .bind(Uuid::now_v7())
            .bind(data.agency_id)
            .bind(&data.title)
            .bind(&data.property_address)
            .bind(&data.agency_name)
            .bind(&data.agency_email)
            .bind(&data.agent_name)
            .bind(&data.agent_email)
            .bind(&data.customer_name)
            .bind(&data.customer_email)
            .bind(data.scheduled_at)
            .bind(data.duration_minutes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create meeting", e))
    }

    /// Apply a user-driven status change, rejecting illegal transitions.
    ///
    /// The update is guarded on the status read beforehand so a concurrent
    /// change surfaces as a conflict instead of being overwritten.
    pub async fn update_status(&self, id: Uuid, next: MeetingStatus) -> AppResult<Meeting> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Meeting {id} not found")))?;

        if !current.status.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "Cannot move meeting {id} from {} to {next}",
                current.status
            )));
        }

        sqlx::query_as::<_, Meeting>(
            "UPDATE meetings SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING *",
        )
        .bind(id)
        .bind(current.status)
        .bind(next)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update meeting status", e))?
        .ok_or_else(|| AppError::conflict(format!("Meeting {id} changed concurrently")))
    }

    /// Move a meeting to a new start time and re-arm both reminders.
    pub async fn reschedule(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> AppResult<Meeting> {
        sqlx::query_as::<_, Meeting>(
            "UPDATE meetings SET scheduled_at = $2, day_reminder_sent = FALSE, \
             hour_reminder_sent = FALSE, updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'confirmed') RETURNING *",
        )
        .bind(id)
        .bind(scheduled_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reschedule meeting", e))?
        .ok_or_else(|| AppError::not_found(format!("No active meeting {id} to reschedule")))
    }
}

#[async_trait]
impl MeetingStore for MeetingRepository {
    async fn find_due(&self, query: &DueQuery) -> AppResult<Vec<Meeting>> {
        let sql = format!(
            "SELECT * FROM meetings \
             WHERE scheduled_at BETWEEN $1 AND $2 \
             AND status IN ('pending', 'confirmed') \
             AND {} = FALSE \
             ORDER BY scheduled_at ASC",
            query.kind.flag_column()
        );

        sqlx::query_as::<_, Meeting>(&sql)
            .bind(query.window.start)
            .bind(query.window.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to find meetings due for {} reminder", query.kind),
                    e,
                )
            })
    }

    async fn conditional_mark_sent(&self, meeting_id: Uuid, kind: ReminderKind) -> AppResult<bool> {
        let column = kind.flag_column();
        let sql = format!(
            "UPDATE meetings SET {column} = TRUE, updated_at = NOW() \
             WHERE id = $1 AND {column} = FALSE"
        );

        let result = sqlx::query(&sql)
            .bind(meeting_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to mark reminder sent", e)
            })?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>> {
        sqlx::query_as::<_, Meeting>(
            "SELECT * FROM meetings \
             WHERE status IN ('pending', 'confirmed') \
             AND scheduled_at + make_interval(mins => duration_minutes) <= $1 \
             ORDER BY scheduled_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find overdue meetings", e))
    }

    async fn complete_if_active(&self, meeting_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE meetings SET status = 'completed', updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'confirmed')",
        )
        .bind(meeting_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete meeting", e))?;

        Ok(result.rows_affected() == 1)
    }
}
