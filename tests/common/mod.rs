#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fieldroute::config::SchedulerConfig;
use fieldroute::engine::Scheduler;
use fieldroute::error::Result;
use fieldroute::models::event::{NewScheduledEvent, StatusUpdate};
use fieldroute::models::{EventStatus, EventType, GpsActivityLog, Priority, ScheduledEvent};
use fieldroute::repositories::{EventStore, InMemoryEventStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 4).unwrap()
}

pub fn at(h: u32, m: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h, m, 0)
}

pub fn scheduler() -> (Scheduler, Arc<InMemoryEventStore>) {
    let store = Arc::new(InMemoryEventStore::new());
    let scheduler = Scheduler::new(store.clone(), SchedulerConfig::default());
    (scheduler, store)
}

pub fn new_event(driver: &str) -> NewScheduledEvent {
    NewScheduledEvent {
        event_type: EventType::Delivery,
        ticket_id: Some("T-1001".to_string()),
        job_id: Some("J-2001".to_string()),
        job_name: "Hangar roof".to_string(),
        job_address: Some("100 Airport Rd".to_string()),
        city: Some("Huntsville".to_string()),
        state: Some("AL".to_string()),
        zip: Some("35824".to_string()),
        scheduled_date: day(),
        scheduled_time: at(10, 30),
        estimated_duration: 60,
        assigned_to: driver.to_string(),
        assigned_to_name: "Driver A".to_string(),
        assigned_by_name: Some("Dispatch".to_string()),
        customer_name: Some("Acme Aviation".to_string()),
        customer_phone: None,
        project_manager: None,
        priority: Priority::Normal,
        notes: None,
        gps_latitude: Some(34.73),
        gps_longitude: Some(-86.58),
        created_by: "dispatch-1".to_string(),
        created_by_name: Some("Dispatch".to_string()),
    }
}

pub fn located(driver: &str, time: Option<NaiveTime>, lat: f64, lon: f64) -> NewScheduledEvent {
    let mut input = new_event(driver);
    input.scheduled_time = time;
    input.gps_latitude = Some(lat);
    input.gps_longitude = Some(lon);
    input
}

pub fn status(status: EventStatus) -> StatusUpdate {
    StatusUpdate {
        status,
        actor_id: "driver-a".to_string(),
        actor_name: "Driver A".to_string(),
        gps: None,
        notes: None,
    }
}

/// Wraps a store and stalls every call, for exercising timeouts.
pub struct SlowStore {
    pub inner: InMemoryEventStore,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl EventStore for SlowStore {
    async fn get_event(&self, event_id: Uuid) -> Result<ScheduledEvent> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_event(event_id).await
    }

    async fn events_for_date(
        &self,
        date: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        tokio::time::sleep(self.delay).await;
        self.inner.events_for_date(date, driver_id).await
    }

    async fn events_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        tokio::time::sleep(self.delay).await;
        self.inner.events_for_range(start, end, driver_id).await
    }

    async fn events_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ScheduledEvent>> {
        tokio::time::sleep(self.delay).await;
        self.inner.events_updated_since(since).await
    }

    async fn insert_event(&self, event: &ScheduledEvent) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_event(event).await
    }

    async fn update_event(&self, event: &ScheduledEvent, expected_version: i64) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_event(event, expected_version).await
    }

    async fn append_gps_log(&self, log: &GpsActivityLog) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.append_gps_log(log).await
    }

    async fn gps_logs_for_user(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<GpsActivityLog>> {
        tokio::time::sleep(self.delay).await;
        self.inner.gps_logs_for_user(user_id, date).await
    }

    async fn gps_logs_for_ticket(&self, ticket_id: &str) -> Result<Vec<GpsActivityLog>> {
        tokio::time::sleep(self.delay).await;
        self.inner.gps_logs_for_ticket(ticket_id).await
    }

    async fn gps_logs_for_event(&self, event_id: Uuid) -> Result<Vec<GpsActivityLog>> {
        tokio::time::sleep(self.delay).await;
        self.inner.gps_logs_for_event(event_id).await
    }
}
