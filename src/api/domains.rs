use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::entities::{account, domain};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateDomainRequest {
    pub account_uid: String,
    pub domain: String,
}

pub async fn create_domain(
    State(state): State<AppState>,
    Json(payload): Json<CreateDomainRequest>,
) -> impl IntoResponse {
    let account_row = match account::Entity::find()
        .filter(account::Column::Uid.eq(payload.account_uid.as_str()))
        .one(&state.db)
        .await
    {
        Ok(Some(a)) => a,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
        }
        Err(e) => {
            tracing::error!("failed to look up account: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create domain").into_response();
        }
    };

    let row = domain::ActiveModel {
        account_id: Set(account_row.id),
        uid: Set(Uuid::new_v4().to_string()),
        domain: Set(payload.domain),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    match row.insert(&state.db).await {
        Ok(created) => (StatusCode::CREATED, Json(json!({ "uid": created.uid }))).into_response(),
        Err(e) => {
            tracing::error!("failed to create domain: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create domain").into_response()
        }
    }
}
