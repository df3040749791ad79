use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

use crate::engine::geo::{haversine_miles, travel_minutes, GeoPoint};
use crate::models::{EventStatus, RouteStop, RouteSummary, ScheduledEvent};

#[derive(Debug, Clone, Copy)]
pub struct RouteSettings {
    pub average_speed_mph: f64,
    pub day_start: NaiveTime,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            average_speed_mph: 30.0,
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Route order for a driver's day: timed stops by time, then untimed stops
/// in creation order. Cancelled work is dropped.
pub fn order_stops(events: Vec<ScheduledEvent>) -> Vec<ScheduledEvent> {
    let (mut timed, mut untimed): (Vec<_>, Vec<_>) = events
        .into_iter()
        .filter(|e| e.status != EventStatus::Cancelled)
        .partition(|e| e.scheduled_time.is_some());

    timed.sort_by(|a, b| {
        a.scheduled_time
            .cmp(&b.scheduled_time)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
    untimed.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });

    timed.extend(untimed);
    timed
}

/// Walks the stops in the given order and attaches distances and arrival
/// estimates. Stops without coordinates keep their place but add neither
/// distance nor travel time; legs are measured from the last located stop.
pub fn build_route(
    driver_id: &str,
    date: NaiveDate,
    start: Option<GeoPoint>,
    ordered: Vec<ScheduledEvent>,
    settings: &RouteSettings,
) -> RouteSummary {
    let midnight = date.and_time(NaiveTime::MIN);

    let earliest_slot = ordered
        .iter()
        .filter_map(|e| e.scheduled_time)
        .min()
        .map(minutes_of)
        .unwrap_or(f64::MAX);
    let mut clock = minutes_of(settings.day_start).min(earliest_slot);

    let mut last_point = start;
    let mut total_distance = 0.0;
    let mut total_travel = 0.0;
    let mut unlocated: Vec<Uuid> = Vec::new();
    let mut stops = Vec::with_capacity(ordered.len());

    for (position, event) in ordered.into_iter().enumerate() {
        let here = event.location();

        let leg = match here {
            Some(point) => Some(last_point.map_or(0.0, |prev| haversine_miles(prev, point))),
            None => {
                unlocated.push(event.event_id);
                None
            }
        };

        let travel = leg.map_or(0.0, |miles| travel_minutes(miles, settings.average_speed_mph));
        total_distance += leg.unwrap_or(0.0);
        total_travel += travel;

        let ready = clock + travel;
        let arrival = match event.scheduled_time {
            Some(slot) => ready.max(minutes_of(slot)),
            None => ready,
        };
        let departure = arrival + event.estimated_duration as f64;
        clock = departure;

        if here.is_some() {
            last_point = here;
        }

        stops.push(RouteStop {
            position,
            pinned: event.scheduled_time.is_some(),
            leg_distance_miles: leg,
            cumulative_distance_miles: total_distance,
            estimated_arrival: offset(midnight, arrival),
            estimated_departure: offset(midnight, departure),
            event,
        });
    }

    RouteSummary {
        driver_id: driver_id.to_string(),
        date,
        start,
        stops,
        total_distance_miles: total_distance,
        total_travel_minutes: total_travel,
        distance_complete: unlocated.is_empty(),
        unlocated,
    }
}

fn minutes_of(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 / 60.0
}

fn offset(midnight: NaiveDateTime, minutes: f64) -> NaiveDateTime {
    midnight + Duration::seconds((minutes * 60.0).round() as i64)
}
