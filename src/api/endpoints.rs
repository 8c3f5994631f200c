use axum::extract::{Path, State};
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::aggregator;
use crate::AppState;

pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    match aggregator::get_endpoint_detail(&state.db, &uid).await {
        Ok(Some(detail)) => Json(detail).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response(),
        Err(e) => {
            tracing::error!("failed to read endpoint {}: {}", uid, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read endpoint").into_response()
        }
    }
}
