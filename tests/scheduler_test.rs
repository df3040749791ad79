mod common;

use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use common::{at, day, new_event, scheduler, status, SlowStore};
use fieldroute::config::SchedulerConfig;
use fieldroute::engine::{Scheduler, TransitionPolicy};
use fieldroute::error::SchedulingError;
use fieldroute::models::event::{GpsFix, NewNote, Reassignment, Reschedule};
use fieldroute::models::route::TimelineEntry;
use fieldroute::models::{ActivityType, EventStatus, NewGpsActivity};
use std::sync::Arc;
use std::time::Duration;

fn strict_scheduler() -> Scheduler {
    let config = SchedulerConfig {
        policy: TransitionPolicy::Strict,
        ..SchedulerConfig::default()
    };
    Scheduler::new(
        Arc::new(fieldroute::repositories::InMemoryEventStore::new()),
        config,
    )
}

#[tokio::test]
async fn test_delivery_lifecycle() {
    let (scheduler, _) = scheduler();
    let event = scheduler.create_event(new_event("driver-a")).await.unwrap();

    let mut en_route = status(EventStatus::EnRoute);
    en_route.gps = Some(GpsFix {
        latitude: 34.70,
        longitude: -86.60,
        accuracy: Some(10.0),
    });
    scheduler
        .update_event_status(event.event_id, en_route)
        .await
        .unwrap();

    let mut done = status(EventStatus::Completed);
    done.gps = Some(GpsFix {
        latitude: 34.7301,
        longitude: -86.5801,
        accuracy: Some(4.0),
    });
    done.notes = Some("signed by front desk".to_string());
    let completed = scheduler
        .update_event_status(event.event_id, done)
        .await
        .unwrap();

    assert_eq!(completed.status, EventStatus::Completed);
    assert_eq!(completed.status_history.len(), 3);
    assert_eq!(completed.version, 3);
    assert_eq!(completed.gps_latitude, Some(34.7301));
    assert!(completed.notes.contains("signed by front desk"));

    let stored = scheduler.get_event(event.event_id).await.unwrap();
    assert_eq!(stored, completed);

    let timestamps: Vec<_> = stored.status_history.iter().map(|h| h.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_strict_policy_blocks_reopening() {
    let scheduler = strict_scheduler();
    let event = scheduler.create_event(new_event("driver-a")).await.unwrap();

    scheduler
        .update_event_status(event.event_id, status(EventStatus::InProgress))
        .await
        .unwrap();
    scheduler
        .update_event_status(event.event_id, status(EventStatus::Completed))
        .await
        .unwrap();

    let err = scheduler
        .update_event_status(event.event_id, status(EventStatus::Scheduled))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::InvalidTransition { .. }));

    let stored = scheduler.get_event(event.event_id).await.unwrap();
    assert_eq!(stored.status, EventStatus::Completed);
    assert_eq!(stored.status_history.len(), 3);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let (scheduler, _) = scheduler();
    let err = scheduler
        .update_event_status(uuid::Uuid::new_v4(), status(EventStatus::EnRoute))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NotFound { .. }));
}

#[tokio::test]
async fn test_invalid_event_is_not_stored() {
    let (scheduler, _) = scheduler();
    let mut input = new_event("driver-a");
    input.gps_latitude = Some(95.0);

    let err = scheduler.create_event(input).await.unwrap_err();
    assert!(matches!(err, SchedulingError::Validation(_)));

    let events = scheduler.get_events_for_date(day(), None).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_reschedule_moves_event_between_days() {
    let (scheduler, _) = scheduler();
    let event = scheduler.create_event(new_event("driver-a")).await.unwrap();
    let monday = NaiveDate::from_ymd_opt(2025, 12, 8).unwrap();

    let moved = scheduler
        .reschedule_event(
            event.event_id,
            Reschedule {
                scheduled_date: monday,
                scheduled_time: at(13, 0),
                actor_id: "dispatch-1".to_string(),
                actor_name: "Dispatch".to_string(),
                notes: Some("customer closed Thursday".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.status, EventStatus::Scheduled);
    assert_eq!(moved.status_history.len(), 3);
    assert!(scheduler.get_events_for_date(day(), None).await.unwrap().is_empty());
    assert_eq!(
        scheduler.get_events_for_date(monday, None).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_reassign_and_notes() {
    let (scheduler, _) = scheduler();
    let event = scheduler.create_event(new_event("driver-a")).await.unwrap();

    scheduler
        .reassign_event(
            event.event_id,
            Reassignment {
                assigned_to: "driver-b".to_string(),
                assigned_to_name: "Driver B".to_string(),
                assigned_by_name: "Dispatch".to_string(),
            },
        )
        .await
        .unwrap();
    let noted = scheduler
        .add_note(
            event.event_id,
            NewNote {
                author_name: "Driver B".to_string(),
                text: "forklift on site".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(noted.assigned_to, "driver-b");
    assert!(noted.notes.ends_with("Driver B: forklift on site"));
    assert_eq!(noted.version, 3);

    let for_a = scheduler
        .get_events_for_date(day(), Some("driver-a"))
        .await
        .unwrap();
    let for_b = scheduler
        .get_events_for_date(day(), Some("driver-b"))
        .await
        .unwrap();
    assert!(for_a.is_empty());
    assert_eq!(for_b.len(), 1);
}

#[tokio::test]
async fn test_week_query_rejects_inverted_range() {
    let (scheduler, _) = scheduler();
    let start = NaiveDate::from_ymd_opt(2025, 12, 7).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();

    let err = scheduler
        .get_events_for_week(start, end, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::InvalidRange { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_never_lose_history() {
    let (scheduler, _) = scheduler();
    let event = scheduler.create_event(new_event("driver-a")).await.unwrap();

    let writers = 8;
    let mut handles = Vec::new();
    for i in 0..writers {
        let scheduler = scheduler.clone();
        let id = event.event_id;
        handles.push(tokio::spawn(async move {
            let next = if i % 2 == 0 {
                EventStatus::EnRoute
            } else {
                EventStatus::InProgress
            };
            scheduler.update_event_status(id, status(next)).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) if err.is_conflict() => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    assert!(successes >= 1);
    assert_eq!(successes + conflicts, writers);

    let stored = scheduler.get_event(event.event_id).await.unwrap();
    assert_eq!(stored.status_history.len(), 1 + successes);
    assert_eq!(stored.version, 1 + successes as i64);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(200)));
    let config = SchedulerConfig {
        store_timeout: Duration::from_millis(10),
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(store, config);

    let err = scheduler
        .get_events_for_date(day(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::Timeout { .. }));

    let err = scheduler.create_event(new_event("driver-a")).await.unwrap_err();
    assert!(matches!(err, SchedulingError::Timeout { .. }));
}

#[tokio::test]
async fn test_timeline_merges_history_and_gps() {
    let (scheduler, _) = scheduler();
    let event = scheduler.create_event(new_event("driver-a")).await.unwrap();

    let base = Utc::now();
    let by_event = NewGpsActivity {
        event_id: Some(event.event_id),
        activity_type: Some(ActivityType::DeliveryArrive),
        user_id: Some("driver-a".to_string()),
        timestamp: Some(base + ChronoDuration::seconds(30)),
        latitude: Some(34.73),
        longitude: Some(-86.58),
        ..Default::default()
    };
    let by_ticket = NewGpsActivity {
        ticket_id: Some("T-1001".to_string()),
        activity_type: Some(ActivityType::CheckIn),
        user_id: Some("driver-a".to_string()),
        timestamp: Some(base + ChronoDuration::seconds(10)),
        latitude: Some(34.72),
        longitude: Some(-86.58),
        ..Default::default()
    };
    scheduler.log_gps_activity(by_event).await.unwrap();
    scheduler.log_gps_activity(by_ticket).await.unwrap();

    let timeline = scheduler.event_timeline(event.event_id).await.unwrap();

    assert_eq!(timeline.entries.len(), 3);
    assert!(matches!(timeline.entries[0], TimelineEntry::Status { .. }));
    let stamps: Vec<_> = timeline.entries.iter().map(|e| e.timestamp()).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_change_feed_reports_terminal_transitions() {
    let (scheduler, _) = scheduler();
    let since = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

    let done = scheduler.create_event(new_event("driver-a")).await.unwrap();
    let dropped = scheduler.create_event(new_event("driver-a")).await.unwrap();
    let pending = scheduler.create_event(new_event("driver-a")).await.unwrap();

    scheduler
        .update_event_status(done.event_id, status(EventStatus::Completed))
        .await
        .unwrap();
    scheduler
        .update_event_status(dropped.event_id, status(EventStatus::Cancelled))
        .await
        .unwrap();
    scheduler
        .update_event_status(pending.event_id, status(EventStatus::EnRoute))
        .await
        .unwrap();

    let changes = scheduler.changes_since(since).await.unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].event_id, done.event_id);
    assert_eq!(changes[0].status, EventStatus::Completed);
    assert_eq!(changes[1].event_id, dropped.event_id);
    assert_eq!(changes[1].status, EventStatus::Cancelled);

    let later = scheduler.changes_since(Utc::now()).await.unwrap();
    assert!(later.is_empty());
}
