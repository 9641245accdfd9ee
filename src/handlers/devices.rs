// src/handlers/devices.rs

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::metrics::MetricsRecorder;
use crate::models::{Device, DeviceType};
use crate::sync::DeviceRegistration;

use super::AppState;

// ==================== 注册 / 心跳 ====================

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub user_id: String,
    pub device_id: String,
    pub device_type: Option<DeviceType>,
    pub device_name: Option<String>,
    pub browser_info: Option<String>,
    pub connection_id: Option<String>,
    pub current_context: Option<Value>,
}

/// RegisterOrHeartbeat：带设备元信息时先做幂等注册，随后刷新心跳
pub async fn register_or_heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> AppResult<Json<Value>> {
    let has_metadata = req.device_type.is_some()
        || req.device_name.is_some()
        || req.browser_info.is_some()
        || req.connection_id.is_some();

    if has_metadata {
        state
            .registry
            .register_device(
                &req.user_id,
                DeviceRegistration {
                    device_id: req.device_id.clone(),
                    device_type: req.device_type,
                    device_name: req.device_name,
                    browser_info: req.browser_info,
                    connection_id: req.connection_id,
                },
            )
            .await?;
    }

    state
        .registry
        .heartbeat(&req.user_id, &req.device_id, req.current_context)
        .await?;
    MetricsRecorder::record_heartbeat();

    Ok(Json(json!({ "status": "ok" })))
}

// ==================== 活跃设备 ====================

#[derive(Debug, Deserialize)]
pub struct ActiveDevicesQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_name: Option<String>,
    pub last_heartbeat: DateTime<Utc>,
    pub is_active: bool,
}

impl From<Device> for DeviceInfo {
    fn from(d: Device) -> Self {
        Self {
            device_id: d.device_id,
            device_type: d.device_type,
            device_name: d.device_name,
            last_heartbeat: d.last_heartbeat,
            is_active: d.is_active,
        }
    }
}

pub async fn get_active_devices(
    State(state): State<AppState>,
    Query(query): Query<ActiveDevicesQuery>,
) -> AppResult<Json<Vec<DeviceInfo>>> {
    let devices = state.registry.get_active_devices(&query.user_id).await?;
    Ok(Json(devices.into_iter().map(DeviceInfo::from).collect()))
}
