// src/models/notification.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 数据库行结构
///
/// 通知表的时间戳存毫秒整数而不是 RFC3339 文本：轮询窗口在 SQL 里
/// 直接按数值比较，协议也把 next_check_ts 以数字回传给客户端。
#[derive(Debug, Clone, FromRow)]
pub struct DeviceNotificationRow {
    pub id: i64,
    pub user_id: String,
    pub source_device: String,
    pub event_type: String,
    pub event_data: Option<String>, // JSON string
    pub created_at: i64,            // epoch millis
    pub delivered: bool,
    pub delivered_at: Option<i64>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<i64>,
}

/// 业务对象
///
/// 状态机：created → delivered（某个合格设备的轮询首次带走它）
/// → acknowledged（客户端确认，仅作观测记录）。两个转换都幂等。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceNotification {
    pub id: i64,
    pub user_id: String,
    pub source_device: String,
    pub event_type: String,
    pub event_data: Option<serde_json::Value>,
    pub created_at: i64,
    pub delivered: bool,
    pub delivered_at: Option<i64>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<i64>,
}

impl From<DeviceNotificationRow> for DeviceNotification {
    fn from(row: DeviceNotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            source_device: row.source_device,
            event_type: row.event_type,
            event_data: row.event_data.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: row.created_at,
            delivered: row.delivered,
            delivered_at: row.delivered_at,
            acknowledged: row.acknowledged,
            acknowledged_at: row.acknowledged_at,
        }
    }
}
