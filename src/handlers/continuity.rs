// src/handlers/continuity.rs

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::models::{ContextSnapshot, SnapshotType};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveSnapshotRequest {
    pub user_id: String,
    pub device_id: String,
    pub snapshot_type: SnapshotType,
    pub context_data: Value,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SaveSnapshotResponse {
    pub snapshot_id: i64,
}

pub async fn save_snapshot(
    State(state): State<AppState>,
    Json(req): Json<SaveSnapshotRequest>,
) -> AppResult<(StatusCode, Json<SaveSnapshotResponse>)> {
    let snapshot_id = state
        .continuity
        .save_snapshot(
            &req.user_id,
            &req.device_id,
            req.snapshot_type,
            req.context_data,
            req.metadata,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(SaveSnapshotResponse { snapshot_id })))
}

#[derive(Debug, Deserialize)]
pub struct LatestSnapshotQuery {
    pub user_id: String,
    pub exclude_device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LatestSnapshotResponse {
    /// 没有任何可用快照时为 null——新用户的正常稳态
    pub snapshot: Option<ContextSnapshot>,
}

pub async fn get_latest_snapshot(
    State(state): State<AppState>,
    Query(query): Query<LatestSnapshotQuery>,
) -> AppResult<Json<LatestSnapshotResponse>> {
    let snapshot = state
        .continuity
        .latest_snapshot(&query.user_id, query.exclude_device_id.as_deref())
        .await?;

    Ok(Json(LatestSnapshotResponse { snapshot }))
}
