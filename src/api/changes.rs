use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::api::response::ApiResult;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    pub since: DateTime<Utc>,
}

/// Completed and cancelled transitions for downstream pollers.
pub async fn list_changes(
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
) -> ApiResult {
    let changes = state.scheduler.changes_since(query.since).await?;

    Ok(Json(json!({
        "since": query.since,
        "changes": changes,
    })))
}
