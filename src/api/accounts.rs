use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::entities::account;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> impl IntoResponse {
    let row = account::ActiveModel {
        uid: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    match row.insert(&state.db).await {
        Ok(created) => (StatusCode::CREATED, Json(json!({ "uid": created.uid }))).into_response(),
        Err(e) => {
            tracing::error!("failed to create account: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create account").into_response()
        }
    }
}
