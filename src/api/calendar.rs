use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::api::response::ApiResult;

use super::AppState;

pub async fn get_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> ApiResult {
    let days = state.scheduler.get_calendar_month(year, month).await?;

    Ok(Json(json!({
        "year": year,
        "month": month,
        "days": days,
    })))
}
