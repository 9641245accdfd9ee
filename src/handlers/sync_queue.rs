// src/handlers/sync_queue.rs

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::metrics::MetricsRecorder;
use crate::models::SyncQueueEntry;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueSyncRequest {
    pub user_id: String,
    pub from_device_id: String,
    /// 省略即广播给该用户的其余设备
    pub to_device_id: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct QueueSyncResponse {
    pub sync_id: i64,
}

pub async fn queue_sync(
    State(state): State<AppState>,
    Json(req): Json<QueueSyncRequest>,
) -> AppResult<(StatusCode, Json<QueueSyncResponse>)> {
    let sync_id = state
        .queue
        .queue_sync(
            &req.user_id,
            &req.from_device_id,
            req.payload,
            req.to_device_id.as_deref(),
        )
        .await?;
    MetricsRecorder::record_queue_op("queue");

    Ok((StatusCode::CREATED, Json(QueueSyncResponse { sync_id })))
}

#[derive(Debug, Deserialize)]
pub struct PendingSyncsQuery {
    pub user_id: String,
    pub device_id: String,
}

pub async fn get_pending_syncs(
    State(state): State<AppState>,
    Query(query): Query<PendingSyncsQuery>,
) -> AppResult<Json<Vec<SyncQueueEntry>>> {
    let entries = state
        .queue
        .pending_syncs(&query.user_id, &query.device_id)
        .await?;
    Ok(Json(entries))
}

pub async fn complete_sync(
    State(state): State<AppState>,
    Path(sync_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.queue.complete_sync(sync_id).await?;
    MetricsRecorder::record_queue_op("complete");
    Ok(StatusCode::NO_CONTENT)
}
