//! Status lifecycle of a scheduled event.
//!
//! Every function here is pure: it takes the event as last read, returns
//! the next version of it and never touches storage. Persisting the result
//! through a version-checked write is the scheduler's job, which keeps the
//! status change and its history entry a single atomic unit.
//!
//! Two policies are supported. `Permissive` accepts any status after any
//! other so dispatchers can override (for example marking a delivery
//! completed after a phone confirmation). `Strict` only accepts the edges
//! listed in [`strict_allows`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::event::{
    EventStatus, GpsFix, NewNote, NewScheduledEvent, Reassignment, Reschedule, ScheduledEvent,
    StatusHistoryEntry, StatusUpdate,
};

const MAX_DURATION_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn allows(&self, from: EventStatus, to: EventStatus) -> bool {
        match self {
            Self::Permissive => true,
            Self::Strict => strict_allows(from, to),
        }
    }

    fn check(&self, from: EventStatus, to: EventStatus) -> Result<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidTransition { from, to })
        }
    }
}

pub fn strict_allows(from: EventStatus, to: EventStatus) -> bool {
    use EventStatus::*;

    matches!(
        (from, to),
        (Scheduled, EnRoute | InProgress | Rescheduled | Cancelled)
            | (EnRoute, InProgress | Rescheduled | Cancelled)
            | (InProgress, Completed | Cancelled)
            | (Rescheduled, Scheduled | Cancelled)
    )
}

/// Builds a fresh event with its initial `scheduled` history entry.
pub fn new_event(input: NewScheduledEvent, now: DateTime<Utc>) -> Result<ScheduledEvent> {
    let assigned_to = input.assigned_to.trim().to_string();
    if assigned_to.is_empty() {
        return Err(SchedulingError::validation("assigned_to is required"));
    }
    let created_by = input.created_by.trim().to_string();
    if created_by.is_empty() {
        return Err(SchedulingError::validation("created_by is required"));
    }
    if input.estimated_duration > MAX_DURATION_MINUTES {
        return Err(SchedulingError::validation(format!(
            "estimated_duration must be at most {} minutes",
            MAX_DURATION_MINUTES
        )));
    }
    validate_coordinates(input.gps_latitude, input.gps_longitude)?;

    let assigned_to_name = if input.assigned_to_name.trim().is_empty() {
        assigned_to.clone()
    } else {
        input.assigned_to_name
    };
    let creator_name = input
        .created_by_name
        .clone()
        .unwrap_or_else(|| created_by.clone());

    let mut event = ScheduledEvent {
        event_id: Uuid::new_v4(),
        event_type: input.event_type,
        ticket_id: input.ticket_id,
        job_id: input.job_id,
        job_name: input.job_name,
        job_address: input.job_address,
        city: input.city,
        state: input.state,
        zip: input.zip,
        scheduled_date: input.scheduled_date,
        scheduled_time: input.scheduled_time,
        estimated_duration: input.estimated_duration,
        assigned_to,
        assigned_to_name,
        assigned_by_name: input.assigned_by_name,
        customer_name: input.customer_name,
        customer_phone: input.customer_phone,
        project_manager: input.project_manager,
        priority: input.priority,
        status: EventStatus::Scheduled,
        notes: String::new(),
        gps_latitude: input.gps_latitude,
        gps_longitude: input.gps_longitude,
        created_by: created_by.clone(),
        created_at: now,
        updated_at: now,
        status_history: vec![StatusHistoryEntry {
            status: EventStatus::Scheduled,
            timestamp: now,
            actor_id: created_by,
            actor_name: creator_name.clone(),
            gps: None,
            notes: None,
        }],
        version: 1,
    };

    if let Some(notes) = input.notes.as_deref() {
        event.append_note(now, &creator_name, notes);
    }

    Ok(event)
}

/// Applies a status change and appends exactly one history entry.
pub fn apply_transition(
    event: &ScheduledEvent,
    update: &StatusUpdate,
    policy: TransitionPolicy,
    now: DateTime<Utc>,
) -> Result<ScheduledEvent> {
    require_actor(&update.actor_id)?;
    if let Some(gps) = &update.gps {
        validate_fix(gps)?;
    }
    policy.check(event.status, update.status)?;

    let mut next = event.clone();
    let stamp = next_timestamp(event, now);

    next.status_history.push(StatusHistoryEntry {
        status: update.status,
        timestamp: stamp,
        actor_id: update.actor_id.clone(),
        actor_name: update.actor_name.clone(),
        gps: update.gps,
        notes: update.notes.clone(),
    });
    next.status = update.status;

    if update.status.is_arrival() {
        if let Some(gps) = update.gps {
            next.gps_latitude = Some(gps.latitude);
            next.gps_longitude = Some(gps.longitude);
        }
    }

    if let Some(notes) = update.notes.as_deref() {
        next.append_note(stamp, &update.actor_name, notes);
    }

    touch(&mut next, stamp);
    Ok(next)
}

/// Moves the event to a new slot, recording `rescheduled` then `scheduled`.
pub fn apply_reschedule(
    event: &ScheduledEvent,
    reschedule: &Reschedule,
    policy: TransitionPolicy,
    now: DateTime<Utc>,
) -> Result<ScheduledEvent> {
    require_actor(&reschedule.actor_id)?;
    if policy == TransitionPolicy::Strict && event.status != EventStatus::Rescheduled {
        policy.check(event.status, EventStatus::Rescheduled)?;
    }

    let mut next = event.clone();
    let stamp = next_timestamp(event, now);

    let moved = format!(
        "moved from {} to {}",
        describe_slot(event.scheduled_date, event.scheduled_time),
        describe_slot(reschedule.scheduled_date, reschedule.scheduled_time)
    );
    let entry_notes = match reschedule.notes.as_deref() {
        Some(extra) if !extra.trim().is_empty() => format!("{}; {}", moved, extra.trim()),
        _ => moved,
    };

    if event.status != EventStatus::Rescheduled {
        next.status_history.push(StatusHistoryEntry {
            status: EventStatus::Rescheduled,
            timestamp: stamp,
            actor_id: reschedule.actor_id.clone(),
            actor_name: reschedule.actor_name.clone(),
            gps: None,
            notes: Some(entry_notes.clone()),
        });
    }
    next.status_history.push(StatusHistoryEntry {
        status: EventStatus::Scheduled,
        timestamp: stamp,
        actor_id: reschedule.actor_id.clone(),
        actor_name: reschedule.actor_name.clone(),
        gps: None,
        notes: None,
    });

    next.status = EventStatus::Scheduled;
    next.scheduled_date = reschedule.scheduled_date;
    next.scheduled_time = reschedule.scheduled_time;
    next.append_note(stamp, &reschedule.actor_name, &entry_notes);

    touch(&mut next, stamp);
    Ok(next)
}

/// Replaces the single primary assignee. Status and history are untouched.
pub fn apply_reassignment(
    event: &ScheduledEvent,
    reassignment: &Reassignment,
    policy: TransitionPolicy,
    now: DateTime<Utc>,
) -> Result<ScheduledEvent> {
    let assigned_to = reassignment.assigned_to.trim();
    if assigned_to.is_empty() {
        return Err(SchedulingError::validation("assigned_to is required"));
    }
    if policy == TransitionPolicy::Strict && event.status.is_terminal() {
        return Err(SchedulingError::validation(format!(
            "cannot reassign an event that is {}",
            event.status
        )));
    }

    let mut next = event.clone();
    let stamp = next_timestamp(event, now);

    let previous = format!("{} ({})", event.assigned_to_name, event.assigned_to);
    next.assigned_to = assigned_to.to_string();
    next.assigned_to_name = reassignment.assigned_to_name.clone();
    next.assigned_by_name = Some(reassignment.assigned_by_name.clone());
    next.append_note(
        stamp,
        &reassignment.assigned_by_name,
        &format!(
            "reassigned from {} to {} ({})",
            previous, reassignment.assigned_to_name, next.assigned_to
        ),
    );

    touch(&mut next, stamp);
    Ok(next)
}

pub fn apply_note(event: &ScheduledEvent, note: &NewNote, now: DateTime<Utc>) -> Result<ScheduledEvent> {
    if note.text.trim().is_empty() {
        return Err(SchedulingError::validation("note text is required"));
    }

    let mut next = event.clone();
    let stamp = next_timestamp(event, now);
    next.append_note(stamp, &note.author_name, &note.text);
    touch(&mut next, stamp);
    Ok(next)
}

pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => validate_lat_lon(lat, lon),
        _ => Err(SchedulingError::validation(
            "latitude and longitude must be supplied together",
        )),
    }
}

pub fn validate_lat_lon(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(SchedulingError::validation(format!(
            "latitude {} is out of range",
            latitude
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(SchedulingError::validation(format!(
            "longitude {} is out of range",
            longitude
        )));
    }
    Ok(())
}

fn validate_fix(fix: &GpsFix) -> Result<()> {
    validate_lat_lon(fix.latitude, fix.longitude)?;
    if matches!(fix.accuracy, Some(a) if !(a.is_finite() && a >= 0.0)) {
        return Err(SchedulingError::validation("accuracy must be non-negative"));
    }
    Ok(())
}

fn require_actor(actor_id: &str) -> Result<()> {
    if actor_id.trim().is_empty() {
        return Err(SchedulingError::validation("actor_id is required"));
    }
    Ok(())
}

// History must stay non-decreasing even if the server clock steps back.
fn next_timestamp(event: &ScheduledEvent, now: DateTime<Utc>) -> DateTime<Utc> {
    match event.last_transition() {
        Some(last) if last.timestamp > now => last.timestamp,
        _ => now,
    }
}

fn touch(event: &mut ScheduledEvent, at: DateTime<Utc>) {
    event.updated_at = at.max(event.updated_at);
    event.version += 1;
}

fn describe_slot(date: chrono::NaiveDate, time: Option<chrono::NaiveTime>) -> String {
    match time {
        Some(t) => format!("{} {}", date, t.format("%H:%M")),
        None => date.to_string(),
    }
}
