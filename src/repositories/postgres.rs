use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ensure_range, EventStore};
use crate::error::{Result, SchedulingError};
use crate::models::{GpsActivityLog, ScheduledEvent};

/// Postgres-backed store. Status and history live in one row so a single
/// conditional UPDATE writes both.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, event_id: Uuid) -> Result<Option<i64>> {
        let version: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM scheduled_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(version.map(|(v,)| v))
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn get_event(&self, event_id: Uuid) -> Result<ScheduledEvent> {
        sqlx::query_as::<_, ScheduledEvent>("SELECT * FROM scheduled_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SchedulingError::event_not_found(event_id))
    }

    async fn events_for_date(
        &self,
        date: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        let events = sqlx::query_as::<_, ScheduledEvent>(
            "SELECT * FROM scheduled_events
             WHERE scheduled_date = $1 AND ($2::TEXT IS NULL OR assigned_to = $2)
             ORDER BY created_at, event_id",
        )
        .bind(date)
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn events_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        ensure_range(start, end)?;

        let events = sqlx::query_as::<_, ScheduledEvent>(
            "SELECT * FROM scheduled_events
             WHERE scheduled_date BETWEEN $1 AND $2 AND ($3::TEXT IS NULL OR assigned_to = $3)
             ORDER BY created_at, event_id",
        )
        .bind(start)
        .bind(end)
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn events_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ScheduledEvent>> {
        let events = sqlx::query_as::<_, ScheduledEvent>(
            "SELECT * FROM scheduled_events WHERE updated_at > $1 ORDER BY updated_at, event_id",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn insert_event(&self, event: &ScheduledEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO scheduled_events (
                event_id, event_type, ticket_id, job_id, job_name, job_address, city, state, zip,
                scheduled_date, scheduled_time, estimated_duration,
                assigned_to, assigned_to_name, assigned_by_name,
                customer_name, customer_phone, project_manager,
                priority, status, notes, gps_latitude, gps_longitude,
                created_by, created_at, updated_at, status_history, version
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                     $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28)",
        )
        .bind(event.event_id)
        .bind(event.event_type)
        .bind(&event.ticket_id)
        .bind(&event.job_id)
        .bind(&event.job_name)
        .bind(&event.job_address)
        .bind(&event.city)
        .bind(&event.state)
        .bind(&event.zip)
        .bind(event.scheduled_date)
        .bind(event.scheduled_time)
        .bind(event.estimated_duration as i32)
        .bind(&event.assigned_to)
        .bind(&event.assigned_to_name)
        .bind(&event.assigned_by_name)
        .bind(&event.customer_name)
        .bind(&event.customer_phone)
        .bind(&event.project_manager)
        .bind(event.priority)
        .bind(event.status)
        .bind(&event.notes)
        .bind(event.gps_latitude)
        .bind(event.gps_longitude)
        .bind(&event.created_by)
        .bind(event.created_at)
        .bind(event.updated_at)
        .bind(Json(&event.status_history))
        .bind(event.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_event(&self, event: &ScheduledEvent, expected_version: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE scheduled_events SET
                ticket_id = $3, job_id = $4, job_name = $5, job_address = $6, city = $7,
                state = $8, zip = $9, scheduled_date = $10, scheduled_time = $11,
                estimated_duration = $12, assigned_to = $13, assigned_to_name = $14,
                assigned_by_name = $15, customer_name = $16, customer_phone = $17,
                project_manager = $18, priority = $19, status = $20, notes = $21,
                gps_latitude = $22, gps_longitude = $23, updated_at = $24,
                status_history = $25, version = $26
             WHERE event_id = $1 AND version = $2",
        )
        .bind(event.event_id)
        .bind(expected_version)
        .bind(&event.ticket_id)
        .bind(&event.job_id)
        .bind(&event.job_name)
        .bind(&event.job_address)
        .bind(&event.city)
        .bind(&event.state)
        .bind(&event.zip)
        .bind(event.scheduled_date)
        .bind(event.scheduled_time)
        .bind(event.estimated_duration as i32)
        .bind(&event.assigned_to)
        .bind(&event.assigned_to_name)
        .bind(&event.assigned_by_name)
        .bind(&event.customer_name)
        .bind(&event.customer_phone)
        .bind(&event.project_manager)
        .bind(event.priority)
        .bind(event.status)
        .bind(&event.notes)
        .bind(event.gps_latitude)
        .bind(event.gps_longitude)
        .bind(event.updated_at)
        .bind(Json(&event.status_history))
        .bind(event.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_version(event.event_id).await? {
            Some(actual) => Err(SchedulingError::Conflict {
                event_id: event.event_id,
                expected: expected_version,
                actual,
            }),
            None => Err(SchedulingError::event_not_found(event.event_id)),
        }
    }

    async fn append_gps_log(&self, log: &GpsActivityLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO gps_activity_logs (
                log_id, event_id, ticket_id, activity_type, user_id, user_name, timestamp,
                latitude, longitude, accuracy, address, city, state, related_job_number, notes
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(log.log_id)
        .bind(log.event_id)
        .bind(&log.ticket_id)
        .bind(log.activity_type)
        .bind(&log.user_id)
        .bind(&log.user_name)
        .bind(log.timestamp)
        .bind(log.latitude)
        .bind(log.longitude)
        .bind(log.accuracy)
        .bind(&log.address)
        .bind(&log.city)
        .bind(&log.state)
        .bind(&log.related_job_number)
        .bind(&log.notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn gps_logs_for_user(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<GpsActivityLog>> {
        let logs = sqlx::query_as::<_, GpsActivityLog>(
            "SELECT * FROM gps_activity_logs
             WHERE user_id = $1 AND (timestamp AT TIME ZONE 'UTC')::DATE = $2
             ORDER BY timestamp",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn gps_logs_for_ticket(&self, ticket_id: &str) -> Result<Vec<GpsActivityLog>> {
        let logs = sqlx::query_as::<_, GpsActivityLog>(
            "SELECT * FROM gps_activity_logs WHERE ticket_id = $1 ORDER BY timestamp",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn gps_logs_for_event(&self, event_id: Uuid) -> Result<Vec<GpsActivityLog>> {
        let logs = sqlx::query_as::<_, GpsActivityLog>(
            "SELECT * FROM gps_activity_logs WHERE event_id = $1 ORDER BY timestamp",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
