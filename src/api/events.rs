use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::api::response::{ApiError, ApiResult};
use crate::engine::RetryExecutor;
use crate::error::SchedulingError;
use crate::models::event::{
    ListEventsQuery, ListEventsRangeQuery, NewNote, NewScheduledEvent, Reassignment, Reschedule,
    StatusUpdate,
};

use super::AppState;

#[axum::debug_handler]
pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<NewScheduledEvent>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    info!(
        "Received {:?} event for {} on {}",
        payload.event_type, payload.assigned_to, payload.scheduled_date
    );
    let event = state.scheduler.create_event(payload).await?;

    Ok((StatusCode::CREATED, Json(json!(event))))
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult {
    let events = state
        .scheduler
        .get_events_for_date(query.date, query.driver_id.as_deref())
        .await?;

    Ok(Json(json!(events)))
}

pub async fn list_events_for_week(
    State(state): State<AppState>,
    Query(query): Query<ListEventsRangeQuery>,
) -> ApiResult {
    let events = state
        .scheduler
        .get_events_for_week(query.start, query.end, query.driver_id.as_deref())
        .await?;

    Ok(Json(json!(events)))
}

pub async fn get_event(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let event = state.scheduler.get_event(id).await?;
    Ok(Json(json!(event)))
}

// The mutating handlers below re-run the whole read-modify-write when another
// writer got there first, so the retry always starts from fresh state.

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> ApiResult {
    let scheduler = &state.scheduler;
    let event = RetryExecutor::new(state.conflict_retry)
        .execute(
            || scheduler.update_event_status(id, payload.clone()),
            SchedulingError::is_conflict,
        )
        .await?;

    Ok(Json(json!(event)))
}

pub async fn reschedule_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Reschedule>,
) -> ApiResult {
    let scheduler = &state.scheduler;
    let event = RetryExecutor::new(state.conflict_retry)
        .execute(
            || scheduler.reschedule_event(id, payload.clone()),
            SchedulingError::is_conflict,
        )
        .await?;

    Ok(Json(json!(event)))
}

pub async fn reassign_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Reassignment>,
) -> ApiResult {
    let scheduler = &state.scheduler;
    let event = RetryExecutor::new(state.conflict_retry)
        .execute(
            || scheduler.reassign_event(id, payload.clone()),
            SchedulingError::is_conflict,
        )
        .await?;

    Ok(Json(json!(event)))
}

pub async fn add_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewNote>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let scheduler = &state.scheduler;
    let event = RetryExecutor::new(state.conflict_retry)
        .execute(
            || scheduler.add_note(id, payload.clone()),
            SchedulingError::is_conflict,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!(event))))
}

pub async fn get_timeline(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let timeline = state.scheduler.event_timeline(id).await?;
    Ok(Json(json!(timeline)))
}
