use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::api::response::{ApiError, ApiResult};
use crate::engine::gps_logger;
use crate::models::NewGpsActivity;

use super::AppState;

pub async fn log_activity(
    State(state): State<AppState>,
    Json(payload): Json<NewGpsActivity>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let log = state.scheduler.log_gps_activity(payload).await?;
    Ok((StatusCode::CREATED, Json(json!(log))))
}

pub async fn get_user_route(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(String, NaiveDate)>,
) -> ApiResult {
    let points = state.scheduler.get_gps_route(&user_id, date).await?;
    let total = gps_logger::travel_distance(&points);

    Ok(Json(json!({
        "user_id": user_id,
        "date": date,
        "total_distance_miles": total,
        "points": points,
    })))
}

pub async fn get_ticket_activity(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult {
    let logs = state.scheduler.get_gps_activity_for_ticket(&ticket_id).await?;
    Ok(Json(json!(logs)))
}
