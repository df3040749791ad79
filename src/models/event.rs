use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::engine::geo::GeoPoint;

/// One unit of field work assigned to a driver or crew.
///
/// Location, customer and assignee names are denormalized copies of the job
/// record so a driver can work without a lookup. They are a cache and can go
/// stale; reconciling them is the job system's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event_id: Uuid,
    pub event_type: EventType,

    pub ticket_id: Option<String>,
    pub job_id: Option<String>,

    pub job_name: String,
    pub job_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,

    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    pub estimated_duration: u32,

    pub assigned_to: String,
    pub assigned_to_name: String,
    pub assigned_by_name: Option<String>,

    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub project_manager: Option<String>,

    pub priority: Priority,
    pub status: EventStatus,

    pub notes: String,

    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub status_history: Vec<StatusHistoryEntry>,

    pub version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ScheduledEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::types::Json;
        use sqlx::Row;

        let estimated_duration: i32 = row.try_get("estimated_duration")?;
        let Json(status_history): Json<Vec<StatusHistoryEntry>> =
            row.try_get("status_history")?;

        Ok(Self {
            event_id: row.try_get("event_id")?,
            event_type: row.try_get("event_type")?,
            ticket_id: row.try_get("ticket_id")?,
            job_id: row.try_get("job_id")?,
            job_name: row.try_get("job_name")?,
            job_address: row.try_get("job_address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip: row.try_get("zip")?,
            scheduled_date: row.try_get("scheduled_date")?,
            scheduled_time: row.try_get("scheduled_time")?,
            estimated_duration: estimated_duration.max(0) as u32,
            assigned_to: row.try_get("assigned_to")?,
            assigned_to_name: row.try_get("assigned_to_name")?,
            assigned_by_name: row.try_get("assigned_by_name")?,
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            project_manager: row.try_get("project_manager")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            gps_latitude: row.try_get("gps_latitude")?,
            gps_longitude: row.try_get("gps_longitude")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            status_history,
            version: row.try_get("version")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Delivery,
    Pickup,
    Inspection,
    Installation,
    Repair,
    Meeting,
    Other,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type, Serialize,
    Deserialize,
)]
#[sqlx(type_name = "event_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    EnRoute,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::EnRoute => "en_route",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rescheduled => "rescheduled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses that mean the crew is physically at the work site.
    pub fn is_arrival(&self) -> bool {
        matches!(self, Self::InProgress | Self::Completed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

impl GpsFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_name: String,
    pub gps: Option<GpsFix>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledEvent {
    pub event_type: EventType,

    pub ticket_id: Option<String>,
    pub job_id: Option<String>,

    #[serde(default)]
    pub job_name: String,
    pub job_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,

    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    #[serde(default = "default_duration")]
    pub estimated_duration: u32,

    pub assigned_to: String,
    pub assigned_to_name: String,
    pub assigned_by_name: Option<String>,

    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub project_manager: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    pub notes: Option<String>,

    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,

    pub created_by: String,
    pub created_by_name: Option<String>,
}

fn default_duration() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: EventStatus,
    pub actor_id: String,
    pub actor_name: String,
    pub gps: Option<GpsFix>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reschedule {
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    pub actor_id: String,
    pub actor_name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reassignment {
    pub assigned_to: String,
    pub assigned_to_name: String,
    pub assigned_by_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub author_name: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub date: NaiveDate,
    pub driver_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsRangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub driver_id: Option<String>,
}

/// A terminal transition as seen by downstream pollers such as billing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub event_id: Uuid,
    pub ticket_id: Option<String>,
    pub job_id: Option<String>,
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
}

impl ScheduledEvent {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.gps_latitude, self.gps_longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }

    pub fn last_transition(&self) -> Option<&StatusHistoryEntry> {
        self.status_history.last()
    }

    /// Appends a timestamped line; earlier notes are never rewritten.
    pub fn append_note(&mut self, at: DateTime<Utc>, author: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let line = format!("[{}] {}: {}", at.format("%Y-%m-%d %H:%M UTC"), author, text);
        if self.notes.is_empty() {
            self.notes = line;
        } else {
            self.notes.push('\n');
            self.notes.push_str(&line);
        }
    }
}
