use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::entities::{domain, scan};
use crate::services::aggregator;
use crate::services::orchestrator::ScanStatus;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateScanRequest {
    pub domain_uid: String,
}

/// Creates a queued scan row and hands it to the orchestrator on the
/// runtime. The response only carries the external identifier; progress is
/// observed through the summary endpoint.
pub async fn create_scan(
    State(state): State<AppState>,
    Json(payload): Json<CreateScanRequest>,
) -> impl IntoResponse {
    let domain_row = match domain::Entity::find()
        .filter(domain::Column::Uid.eq(payload.domain_uid.as_str()))
        .one(&state.db)
        .await
    {
        Ok(Some(d)) => d,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
        }
        Err(e) => {
            tracing::error!("failed to look up domain: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create scan").into_response();
        }
    };

    let row = scan::ActiveModel {
        domain_id: Set(domain_row.id),
        uid: Set(Uuid::new_v4().to_string()),
        status: Set(ScanStatus::Queued.as_str().to_string()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    let created = match row.insert(&state.db).await {
        Ok(created) => created,
        Err(e) => {
            tracing::error!("failed to create scan: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create scan").into_response();
        }
    };

    let orchestrator = state.orchestrator.clone();
    let (scan_id, domain_id) = (created.id, domain_row.id);
    tokio::spawn(async move {
        orchestrator.run_scan(scan_id, domain_id).await;
    });

    (
        StatusCode::CREATED,
        Json(json!({ "scan_uid": created.uid, "status": created.status })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub exclude_html: Option<bool>,
}

pub async fn get_scan(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let exclude_html = query.exclude_html.unwrap_or(false);
    match aggregator::get_scan_summary(&state.db, &uid, exclude_html).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response(),
        Err(e) => {
            tracing::error!("failed to read scan {}: {}", uid, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read scan").into_response()
        }
    }
}
