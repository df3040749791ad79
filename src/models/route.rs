use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{EventStatus, GpsFix, ScheduledEvent};
use super::gps_log::GpsActivityLog;
use crate::engine::geo::GeoPoint;

#[derive(Debug, Clone, Serialize)]
pub struct RouteStop {
    pub position: usize,

    pub event: ScheduledEvent,

    /// Timed stops keep their slot when the route is optimized.
    pub pinned: bool,

    /// `None` when this stop has no coordinates.
    pub leg_distance_miles: Option<f64>,
    pub cumulative_distance_miles: f64,

    pub estimated_arrival: NaiveDateTime,
    pub estimated_departure: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub driver_id: String,
    pub date: NaiveDate,

    pub start: Option<GeoPoint>,

    pub stops: Vec<RouteStop>,

    pub total_distance_miles: f64,
    pub total_travel_minutes: f64,

    /// False when any stop lacked coordinates and the total is partial.
    pub distance_complete: bool,
    pub unlocated: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    Unchanged,
    Exact,
    Heuristic,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizedRoute {
    pub route: RouteSummary,

    pub flexible_order: Vec<Uuid>,
    pub unplaceable: Vec<Uuid>,

    pub baseline_distance_miles: f64,

    pub method: OptimizationMethod,

    /// Search was cut short by its budget or a cancellation.
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteQuery {
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
}

impl RouteQuery {
    pub fn start(&self) -> Option<GeoPoint> {
        match (self.start_lat, self.start_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    Status {
        status: EventStatus,
        timestamp: DateTime<Utc>,
        actor_id: String,
        actor_name: String,
        gps: Option<GpsFix>,
        notes: Option<String>,
    },
    Gps(GpsActivityLog),
}

impl TimelineEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Status { timestamp, .. } => *timestamp,
            Self::Gps(log) => log.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventTimeline {
    pub event: ScheduledEvent,
    pub entries: Vec<TimelineEntry>,
}
