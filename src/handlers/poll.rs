// src/handlers/poll.rs

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::metrics::MetricsRecorder;
use crate::sync::PollResult;

use super::AppState;

// ==================== 轮询端点 ====================

/// 同一端点按 action 分流：poll 拉取通知，heartbeat 顺路刷新活跃状态
/// （省掉每个周期的第二次往返），acknowledge 提交确认。
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollAction {
    Poll,
    Heartbeat,
    Acknowledge,
}

#[derive(Debug, Deserialize)]
pub struct PollRequest {
    pub user_id: String,
    pub device_id: String,
    pub action: Option<PollAction>,
    /// 上次轮询游标（毫秒）；缺省时首次轮询回看 30 秒
    pub last_check: Option<i64>,
    pub current_context: Option<Value>,
    pub event_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    Events(PollResult),
    Acknowledged { acknowledged_count: u64 },
    Ok { status: &'static str },
}

pub async fn poll(
    State(state): State<AppState>,
    Json(req): Json<PollRequest>,
) -> AppResult<Json<PollResponse>> {
    match req.action.unwrap_or(PollAction::Poll) {
        PollAction::Poll => {
            let result = state
                .delivery
                .poll(&req.user_id, &req.device_id, req.last_check)
                .await?;
            MetricsRecorder::record_delivered(result.events.len() as u64);
            Ok(Json(PollResponse::Events(result)))
        }
        PollAction::Heartbeat => {
            state
                .registry
                .heartbeat(&req.user_id, &req.device_id, req.current_context)
                .await?;
            MetricsRecorder::record_heartbeat();
            Ok(Json(PollResponse::Ok { status: "ok" }))
        }
        PollAction::Acknowledge => {
            let ids = req.event_ids.unwrap_or_default();
            let count = state.delivery.acknowledge(&ids).await?;
            MetricsRecorder::record_acknowledged(count);
            Ok(Json(PollResponse::Acknowledged {
                acknowledged_count: count,
            }))
        }
    }
}

// ==================== 事件写入 ====================

#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub user_id: String,
    pub source_device: String,
    pub event_type: String,
    pub event_data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RecordEventResponse {
    pub event_id: i64,
}

pub async fn record_event(
    State(state): State<AppState>,
    Json(req): Json<RecordEventRequest>,
) -> AppResult<(StatusCode, Json<RecordEventResponse>)> {
    let event_id = state
        .delivery
        .record_event(
            &req.user_id,
            &req.source_device,
            &req.event_type,
            req.event_data,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RecordEventResponse { event_id })))
}
