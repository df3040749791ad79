use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;

use crate::error::SchedulingError;

pub type ApiResult<T = Value> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        let status = match &err {
            SchedulingError::NotFound { .. } => StatusCode::NOT_FOUND,
            SchedulingError::Validation(_) | SchedulingError::InvalidRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            SchedulingError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SchedulingError::Conflict { .. } => StatusCode::CONFLICT,
            SchedulingError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SchedulingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Store details stay in the log, not in the response body.
        let message = match &err {
            SchedulingError::Store(inner) => {
                error!("Store failure: {:#}", inner);
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        Self { status, message }
    }
}
