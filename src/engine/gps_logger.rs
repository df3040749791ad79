use uuid::Uuid;

use crate::engine::geo::haversine_miles;
use crate::engine::state_machine::validate_lat_lon;
use crate::error::{Result, SchedulingError};
use crate::models::{ActivityType, GpsActivityLog, NewGpsActivity};

/// Turns an incoming entry into an immutable log row, rejecting entries
/// without a user, timestamp or coordinates.
pub fn build_log(entry: NewGpsActivity) -> Result<GpsActivityLog> {
    let user_id = entry
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| SchedulingError::validation("user_id is required"))?;
    let timestamp = entry
        .timestamp
        .ok_or_else(|| SchedulingError::validation("timestamp is required"))?;
    let latitude = entry
        .latitude
        .ok_or_else(|| SchedulingError::validation("latitude is required"))?;
    let longitude = entry
        .longitude
        .ok_or_else(|| SchedulingError::validation("longitude is required"))?;

    validate_lat_lon(latitude, longitude)?;
    if matches!(entry.accuracy, Some(a) if !(a.is_finite() && a >= 0.0)) {
        return Err(SchedulingError::validation("accuracy must be non-negative"));
    }

    Ok(GpsActivityLog {
        log_id: Uuid::new_v4(),
        event_id: entry.event_id,
        ticket_id: entry.ticket_id,
        activity_type: entry.activity_type.unwrap_or(ActivityType::Manual),
        user_name: entry.user_name.unwrap_or_else(|| user_id.clone()),
        user_id,
        timestamp,
        latitude,
        longitude,
        accuracy: entry.accuracy,
        address: entry.address,
        city: entry.city,
        state: entry.state,
        related_job_number: entry.related_job_number,
        notes: entry.notes,
    })
}

pub fn sort_by_time(logs: &mut [GpsActivityLog]) {
    logs.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.log_id.cmp(&b.log_id))
    });
}

/// Sum of haversine legs between consecutive points, assumed time-sorted.
pub fn travel_distance(route: &[GpsActivityLog]) -> f64 {
    route
        .windows(2)
        .map(|pair| haversine_miles(pair[0].point(), pair[1].point()))
        .sum()
}
