pub mod memory;
pub mod postgres;

pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{GpsActivityLog, ScheduledEvent};

/// Persistence boundary for scheduled events and GPS activity logs.
///
/// Implementations must make `update_event` conditional on the stored
/// `version` so two writers that read the same state cannot both win.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, event_id: Uuid) -> Result<ScheduledEvent>;

    async fn events_for_date(
        &self,
        date: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>>;

    /// Inclusive on both ends. Fails with `InvalidRange` when `start > end`.
    async fn events_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>>;

    async fn events_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ScheduledEvent>>;

    async fn insert_event(&self, event: &ScheduledEvent) -> Result<()>;

    /// Replaces the stored event if its version still equals `expected_version`.
    /// The caller has already bumped `event.version`.
    async fn update_event(&self, event: &ScheduledEvent, expected_version: i64) -> Result<()>;

    async fn append_gps_log(&self, log: &GpsActivityLog) -> Result<()>;

    async fn gps_logs_for_user(&self, user_id: &str, date: NaiveDate)
        -> Result<Vec<GpsActivityLog>>;

    async fn gps_logs_for_ticket(&self, ticket_id: &str) -> Result<Vec<GpsActivityLog>>;

    async fn gps_logs_for_event(&self, event_id: Uuid) -> Result<Vec<GpsActivityLog>>;
}

pub(crate) fn ensure_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(crate::error::SchedulingError::InvalidRange { start, end });
    }
    Ok(())
}
