use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::api::response::ApiResult;
use crate::engine::state_machine::validate_coordinates;
use crate::models::route::RouteQuery;

use super::AppState;

pub async fn get_daily_route(
    State(state): State<AppState>,
    Path((driver_id, date)): Path<(String, NaiveDate)>,
    Query(query): Query<RouteQuery>,
) -> ApiResult {
    validate_coordinates(query.start_lat, query.start_lon)?;

    let route = state
        .scheduler
        .get_daily_route(&driver_id, date, query.start())
        .await?;

    Ok(Json(json!(route)))
}

pub async fn optimize_route(
    State(state): State<AppState>,
    Path((driver_id, date)): Path<(String, NaiveDate)>,
    Query(query): Query<RouteQuery>,
) -> ApiResult {
    validate_coordinates(query.start_lat, query.start_lon)?;

    // Dropping the handler future (client went away) cancels the search.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let optimized = state
        .scheduler
        .optimize_route(&driver_id, date, query.start(), cancel)
        .await?;

    Ok(Json(json!(optimized)))
}
