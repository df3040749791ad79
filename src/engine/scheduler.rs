use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::engine::calendar::{self, CalendarMonth};
use crate::engine::geo::GeoPoint;
use crate::engine::optimizer::{self, RouteStrategy, SearchContext};
use crate::engine::route_builder;
use crate::engine::state_machine::{self, TransitionPolicy};
use crate::engine::gps_logger;
use crate::error::{Result, SchedulingError};
use crate::models::event::{
    NewNote, NewScheduledEvent, Reassignment, Reschedule, StatusChange, StatusUpdate,
};
use crate::models::route::{EventTimeline, TimelineEntry};
use crate::models::{GpsActivityLog, NewGpsActivity, OptimizedRoute, RouteSummary, ScheduledEvent};
use crate::repositories::EventStore;

/// Request-scoped entry point. Holds no mutable state of its own: every
/// call reads from the store, computes, and writes back through a
/// version-checked update.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn EventStore>,
    config: SchedulerConfig,
    strategy: Arc<dyn RouteStrategy>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn EventStore>, config: SchedulerConfig) -> Self {
        Self {
            store,
            config,
            strategy: optimizer::default_strategy(),
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn RouteStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.config.policy
    }

    async fn timed<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Store operation '{}' timed out after {:?}",
                    operation, self.config.store_timeout
                );
                Err(SchedulingError::Timeout {
                    operation,
                    after: self.config.store_timeout,
                })
            }
        }
    }

    async fn modify<F>(&self, event_id: Uuid, change: F) -> Result<ScheduledEvent>
    where
        F: FnOnce(&ScheduledEvent) -> Result<ScheduledEvent>,
    {
        let current = self.timed("get_event", self.store.get_event(event_id)).await?;
        let next = change(&current)?;
        self.timed("update_event", self.store.update_event(&next, current.version))
            .await?;
        Ok(next)
    }

    pub async fn create_event(&self, input: NewScheduledEvent) -> Result<ScheduledEvent> {
        let event = state_machine::new_event(input, Utc::now())?;
        self.timed("insert_event", self.store.insert_event(&event)).await?;

        info!(
            "Created {:?} event {} for {} on {}",
            event.event_type, event.event_id, event.assigned_to, event.scheduled_date
        );
        Ok(event)
    }

    pub async fn get_event(&self, event_id: Uuid) -> Result<ScheduledEvent> {
        self.timed("get_event", self.store.get_event(event_id)).await
    }

    pub async fn update_event_status(
        &self,
        event_id: Uuid,
        update: StatusUpdate,
    ) -> Result<ScheduledEvent> {
        let policy = self.config.policy;
        let result = self
            .modify(event_id, |current| {
                state_machine::apply_transition(current, &update, policy, Utc::now())
            })
            .await;

        match &result {
            Ok(event) => info!(
                "Event {} moved to '{}' by {}",
                event_id, event.status, update.actor_id
            ),
            Err(err) if err.is_conflict() => {
                warn!("Status update for event {} lost a race: {}", event_id, err)
            }
            Err(err) => error!("Failed to update status of event {}: {}", event_id, err),
        }
        result
    }

    pub async fn reschedule_event(
        &self,
        event_id: Uuid,
        reschedule: Reschedule,
    ) -> Result<ScheduledEvent> {
        let policy = self.config.policy;
        let event = self
            .modify(event_id, |current| {
                state_machine::apply_reschedule(current, &reschedule, policy, Utc::now())
            })
            .await?;

        info!(
            "Rescheduled event {} to {} by {}",
            event_id, event.scheduled_date, reschedule.actor_id
        );
        Ok(event)
    }

    pub async fn reassign_event(
        &self,
        event_id: Uuid,
        reassignment: Reassignment,
    ) -> Result<ScheduledEvent> {
        let policy = self.config.policy;
        let event = self
            .modify(event_id, |current| {
                state_machine::apply_reassignment(current, &reassignment, policy, Utc::now())
            })
            .await?;

        info!("Reassigned event {} to {}", event_id, event.assigned_to);
        Ok(event)
    }

    pub async fn add_note(&self, event_id: Uuid, note: NewNote) -> Result<ScheduledEvent> {
        self.modify(event_id, |current| {
            state_machine::apply_note(current, &note, Utc::now())
        })
        .await
    }

    pub async fn get_events_for_date(
        &self,
        date: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        self.timed("events_for_date", self.store.events_for_date(date, driver_id))
            .await
    }

    pub async fn get_events_for_week(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        driver_id: Option<&str>,
    ) -> Result<Vec<ScheduledEvent>> {
        if start > end {
            return Err(SchedulingError::InvalidRange { start, end });
        }
        self.timed(
            "events_for_range",
            self.store.events_for_range(start, end, driver_id),
        )
        .await
    }

    pub async fn get_daily_route(
        &self,
        driver_id: &str,
        date: NaiveDate,
        start: Option<GeoPoint>,
    ) -> Result<RouteSummary> {
        let events = self.get_events_for_date(date, Some(driver_id)).await?;
        let ordered = route_builder::order_stops(events);
        let route =
            route_builder::build_route(driver_id, date, start, ordered, &self.config.route);

        debug!(
            "Built route for {} on {}: {} stop(s), {:.2} mi",
            driver_id,
            date,
            route.stops.len(),
            route.total_distance_miles
        );
        Ok(route)
    }

    /// Store failures still propagate; search trouble only degrades quality.
    pub async fn optimize_route(
        &self,
        driver_id: &str,
        date: NaiveDate,
        start: Option<GeoPoint>,
        cancel: CancellationToken,
    ) -> Result<OptimizedRoute> {
        let events = self.get_events_for_date(date, Some(driver_id)).await?;
        let ordered = route_builder::order_stops(events);

        let fallback = ordered.clone();
        let strategy = self.strategy.clone();
        let budget = self.config.search_budget;
        let search = tokio::task::spawn_blocking(move || {
            let ctx = SearchContext::new(budget, cancel);
            optimizer::plan_route(ordered, start, strategy.as_ref(), &ctx)
        });

        let plan = match search.await {
            Ok(plan) => plan,
            Err(err) => {
                error!("Route search for {} on {} failed: {}", driver_id, date, err);
                optimizer::unoptimized(fallback, start)
            }
        };

        if plan.degraded {
            warn!(
                "Route optimization for {} on {} returned a degraded result",
                driver_id, date
            );
        }

        let route =
            route_builder::build_route(driver_id, date, start, plan.ordered, &self.config.route);

        info!(
            "Optimized route for {} on {} with {:?}: {:.2} mi (baseline {:.2} mi)",
            driver_id, date, plan.method, plan.flexible_distance_miles, plan.baseline_distance_miles
        );

        Ok(OptimizedRoute {
            route,
            flexible_order: plan.flexible_order,
            unplaceable: plan.unplaceable,
            baseline_distance_miles: plan.baseline_distance_miles,
            method: plan.method,
            degraded: plan.degraded,
        })
    }

    pub async fn get_calendar_month(&self, year: i32, month: u32) -> Result<CalendarMonth> {
        let (first, last) = calendar::month_bounds(year, month)?;
        let events = self
            .timed("events_for_range", self.store.events_for_range(first, last, None))
            .await?;
        Ok(calendar::group_by_day(year, month, events))
    }

    pub async fn log_gps_activity(&self, entry: NewGpsActivity) -> Result<GpsActivityLog> {
        let log = gps_logger::build_log(entry)?;
        self.timed("append_gps_log", self.store.append_gps_log(&log))
            .await?;

        debug!(
            "Logged {:?} for {} at ({}, {})",
            log.activity_type, log.user_id, log.latitude, log.longitude
        );
        Ok(log)
    }

    pub async fn get_gps_route(&self, user_id: &str, date: NaiveDate) -> Result<Vec<GpsActivityLog>> {
        let mut logs = self
            .timed("gps_logs_for_user", self.store.gps_logs_for_user(user_id, date))
            .await?;
        gps_logger::sort_by_time(&mut logs);
        Ok(logs)
    }

    pub async fn get_travel_distance(&self, user_id: &str, date: NaiveDate) -> Result<f64> {
        let route = self.get_gps_route(user_id, date).await?;
        Ok(gps_logger::travel_distance(&route))
    }

    pub async fn get_gps_activity_for_ticket(&self, ticket_id: &str) -> Result<Vec<GpsActivityLog>> {
        let mut logs = self
            .timed("gps_logs_for_ticket", self.store.gps_logs_for_ticket(ticket_id))
            .await?;
        gps_logger::sort_by_time(&mut logs);
        Ok(logs)
    }

    /// Status history merged with GPS activity for the event and its ticket.
    pub async fn event_timeline(&self, event_id: Uuid) -> Result<EventTimeline> {
        let event = self.get_event(event_id).await?;

        let mut logs = self
            .timed("gps_logs_for_event", self.store.gps_logs_for_event(event_id))
            .await?;
        if let Some(ticket_id) = event.ticket_id.as_deref() {
            let by_ticket = self
                .timed("gps_logs_for_ticket", self.store.gps_logs_for_ticket(ticket_id))
                .await?;
            let mut seen: HashSet<Uuid> = logs.iter().map(|l| l.log_id).collect();
            logs.extend(by_ticket.into_iter().filter(|l| seen.insert(l.log_id)));
        }

        let mut entries: Vec<TimelineEntry> = event
            .status_history
            .iter()
            .map(|h| TimelineEntry::Status {
                status: h.status,
                timestamp: h.timestamp,
                actor_id: h.actor_id.clone(),
                actor_name: h.actor_name.clone(),
                gps: h.gps,
                notes: h.notes.clone(),
            })
            .chain(logs.into_iter().map(TimelineEntry::Gps))
            .collect();
        entries.sort_by_key(|e| e.timestamp());

        Ok(EventTimeline { event, entries })
    }

    /// Terminal transitions newer than `since`, oldest first.
    pub async fn changes_since(&self, since: DateTime<Utc>) -> Result<Vec<StatusChange>> {
        let events = self
            .timed("events_updated_since", self.store.events_updated_since(since))
            .await?;

        let mut changes: Vec<StatusChange> = events
            .iter()
            .flat_map(|event| {
                event
                    .status_history
                    .iter()
                    .filter(move |h| h.status.is_terminal() && h.timestamp > since)
                    .map(move |h| StatusChange {
                        event_id: event.event_id,
                        ticket_id: event.ticket_id.clone(),
                        job_id: event.job_id.clone(),
                        status: h.status,
                        timestamp: h.timestamp,
                        actor_id: h.actor_id.clone(),
                    })
            })
            .collect();
        changes.sort_by_key(|c| c.timestamp);
        Ok(changes)
    }
}
