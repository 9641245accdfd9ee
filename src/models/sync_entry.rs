// src/models/sync_entry.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Completed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "completed" => Ok(SyncStatus::Completed),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}

/// 数据库行结构
#[derive(Debug, Clone, FromRow)]
pub struct SyncQueueEntryRow {
    pub id: i64,
    pub user_id: String,
    pub from_device_id: String,
    pub to_device_id: Option<String>, // NULL 表示广播给该用户的其余设备
    pub payload: String,              // JSON string
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// 业务对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub id: i64,
    pub user_id: String,
    pub from_device_id: String,
    pub to_device_id: Option<String>,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<SyncQueueEntryRow> for SyncQueueEntry {
    fn from(row: SyncQueueEntryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            from_device_id: row.from_device_id,
            to_device_id: row.to_device_id,
            payload: serde_json::from_str(&row.payload).unwrap_or(serde_json::Value::Null),
            status: row.status.parse().unwrap_or(SyncStatus::Pending),
            created_at: super::parse_ts(&row.created_at),
            completed_at: row.completed_at.as_deref().map(super::parse_ts),
        }
    }
}
