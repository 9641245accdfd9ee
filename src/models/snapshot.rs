// src/models/snapshot.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    FullState,
    Partial,
}

impl std::fmt::Display for SnapshotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotType::FullState => write!(f, "full_state"),
            SnapshotType::Partial => write!(f, "partial"),
        }
    }
}

impl std::str::FromStr for SnapshotType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full_state" => Ok(SnapshotType::FullState),
            "partial" => Ok(SnapshotType::Partial),
            _ => Err(format!("Unknown snapshot type: {}", s)),
        }
    }
}

/// 数据库行结构
#[derive(Debug, Clone, FromRow)]
pub struct ContextSnapshotRow {
    pub id: i64,
    pub user_id: String,
    pub device_id: String,
    pub snapshot_type: String,
    pub context_data: String,     // JSON string
    pub metadata: Option<String>, // JSON string
    pub created_at: String,
}

/// 业务对象，追加写入后不再变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub id: i64,
    pub user_id: String,
    pub device_id: String,
    pub snapshot_type: SnapshotType,
    pub context_data: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<ContextSnapshotRow> for ContextSnapshot {
    fn from(row: ContextSnapshotRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            device_id: row.device_id,
            snapshot_type: row.snapshot_type.parse().unwrap_or(SnapshotType::Partial),
            context_data: serde_json::from_str(&row.context_data)
                .unwrap_or(serde_json::Value::Null),
            metadata: row.metadata.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: super::parse_ts(&row.created_at),
        }
    }
}
