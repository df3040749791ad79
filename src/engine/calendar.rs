use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::error::{Result, SchedulingError};
use crate::models::ScheduledEvent;

pub type CalendarMonth = BTreeMap<NaiveDate, Vec<ScheduledEvent>>;

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        SchedulingError::validation(format!("{}-{:02} is not a valid month", year, month))
    })?;

    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next_first
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| SchedulingError::validation(format!("{} is out of range", year)))?;

    Ok((first, last))
}

/// Buckets events by their scheduled date. Only days that have events get
/// a key; within a day timed events come first in time order.
pub fn group_by_day(year: i32, month: u32, events: Vec<ScheduledEvent>) -> CalendarMonth {
    let mut days: CalendarMonth = BTreeMap::new();

    for event in events {
        let date = event.scheduled_date;
        if date.year() != year || date.month() != month {
            continue;
        }
        days.entry(date).or_default().push(event);
    }

    for events in days.values_mut() {
        events.sort_by(|a, b| {
            a.scheduled_time
                .is_none()
                .cmp(&b.scheduled_time.is_none())
                .then_with(|| a.scheduled_time.cmp(&b.scheduled_time))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
    }

    days
}
