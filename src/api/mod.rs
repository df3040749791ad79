pub mod calendar;
pub mod changes;
pub mod events;
pub mod gps;
pub mod health;
pub mod response;
pub mod routes;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::engine::{RetryPolicy, Scheduler};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub conflict_retry: RetryPolicy,
}

pub fn build_router(scheduler: Scheduler, conflict_retry: RetryPolicy) -> Router {
    let state = AppState {
        scheduler,
        conflict_retry,
    };

    Router::new()
        .route("/health", get(health::health_check))
        .route("/events", post(events::create_event))
        .route("/events", get(events::list_events))
        .route("/events/week", get(events::list_events_for_week))
        .route("/events/{id}", get(events::get_event))
        .route("/events/{id}/status", put(events::update_status))
        .route("/events/{id}/reschedule", put(events::reschedule_event))
        .route("/events/{id}/assignee", put(events::reassign_event))
        .route("/events/{id}/notes", post(events::add_note))
        .route("/events/{id}/timeline", get(events::get_timeline))
        .route("/routes/{driver_id}/{date}", get(routes::get_daily_route))
        .route("/routes/{driver_id}/{date}/optimize", post(routes::optimize_route))
        .route("/calendar/{year}/{month}", get(calendar::get_month))
        .route("/gps", post(gps::log_activity))
        .route("/gps/users/{user_id}/{date}", get(gps::get_user_route))
        .route("/gps/tickets/{ticket_id}", get(gps::get_ticket_activity))
        .route("/changes", get(changes::list_changes))
        .with_state(state)
}
