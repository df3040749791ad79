use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::engine::geo::GeoPoint;

/// Append-only geotagged action. Corrections are new rows, never edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GpsActivityLog {
    pub log_id: Uuid,
    pub event_id: Option<Uuid>,
    pub ticket_id: Option<String>,

    pub activity_type: ActivityType,

    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,

    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,

    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,

    pub related_job_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "gps_activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    DeliveryStart,
    DeliveryArrive,
    DeliveryComplete,
    Inspection,
    CheckIn,
    CheckOut,
    Break,
    Login,
    Manual,
}

/// Incoming log entry. Required fields are optional here so a missing value
/// surfaces as a validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGpsActivity {
    pub event_id: Option<Uuid>,
    pub ticket_id: Option<String>,

    pub activity_type: Option<ActivityType>,

    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,

    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,

    pub related_job_number: Option<String>,
    pub notes: Option<String>,
}

impl GpsActivityLog {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}
