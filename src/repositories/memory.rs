use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ensure_range, EventStore};
use crate::error::{Result, SchedulingError};
use crate::models::{GpsActivityLog, ScheduledEvent};

/// Process-local store used by tests and when no database is configured.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<Uuid, ScheduledEvent>>,
    gps_logs: RwLock<Vec<GpsActivityLog>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select<F>(&self, predicate: F) -> Vec<ScheduledEvent>
    where
        F: Fn(&ScheduledEvent) -> bool,
    {
        let events = self.events.read().await;
        let mut selected: Vec<ScheduledEvent> =
            events.values().filter(|e| predicate(e)).cloned().collect();
        selected.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        selected
    }

    async fn select_logs<F>(&self, predicate: F) -> Vec<GpsActivityLog>
    where
        F: Fn(&GpsActivityLog) -> bool,
    {
        let logs = self.gps_logs.read().await;
        let mut selected: Vec<GpsActivityLog> =
            logs.iter().filter(|l| predicate(l)).cloned().collect();
        selected.sort_by_key(|l| l.timestamp);
        selected
    }
}

fn assigned_to(event: &ScheduledEvent, driver_id: Option<&str>) -> bool {
    driver_id.is_none_or(|driver| event.assigned_to == driver)
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_event(&self, event_id: Uuid) -> Result<ScheduledEvent> {
        self.events
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or_else(|| SchedulingError::event_not_found(event_id))
    }

    async fn events_for_date(
        &self,
        date: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        Ok(self
            .select(|e| e.scheduled_date == date && assigned_to(e, driver_id))
            .await)
    }

    async fn events_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        ensure_range(start, end)?;
        Ok(self
            .select(|e| {
                e.scheduled_date >= start && e.scheduled_date <= end && assigned_to(e, driver_id)
            })
            .await)
    }

    async fn events_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ScheduledEvent>> {
        Ok(self.select(|e| e.updated_at > since).await)
    }

    async fn insert_event(&self, event: &ScheduledEvent) -> Result<()> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.event_id) {
            return Err(SchedulingError::validation(format!(
                "event {} already exists",
                event.event_id
            )));
        }
        events.insert(event.event_id, event.clone());
        debug!("Inserted event {}", event.event_id);
        Ok(())
    }

    async fn update_event(&self, event: &ScheduledEvent, expected_version: i64) -> Result<()> {
        let mut events = self.events.write().await;
        let stored = events
            .get_mut(&event.event_id)
            .ok_or_else(|| SchedulingError::event_not_found(event.event_id))?;

        if stored.version != expected_version {
            return Err(SchedulingError::Conflict {
                event_id: event.event_id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        *stored = event.clone();
        Ok(())
    }

    async fn append_gps_log(&self, log: &GpsActivityLog) -> Result<()> {
        self.gps_logs.write().await.push(log.clone());
        Ok(())
    }

    async fn gps_logs_for_user(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<GpsActivityLog>> {
        Ok(self
            .select_logs(|l| l.user_id == user_id && l.timestamp.date_naive() == date)
            .await)
    }

    async fn gps_logs_for_ticket(&self, ticket_id: &str) -> Result<Vec<GpsActivityLog>> {
        Ok(self
            .select_logs(|l| l.ticket_id.as_deref() == Some(ticket_id))
            .await)
    }

    async fn gps_logs_for_event(&self, event_id: Uuid) -> Result<Vec<GpsActivityLog>> {
        Ok(self.select_logs(|l| l.event_id == Some(event_id)).await)
    }
}
