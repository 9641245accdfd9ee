// src/models/device.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Unknown,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Desktop => write!(f, "desktop"),
            DeviceType::Mobile => write!(f, "mobile"),
            DeviceType::Tablet => write!(f, "tablet"),
            DeviceType::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            "unknown" => Ok(DeviceType::Unknown),
            _ => Err(format!("Unknown device type: {}", s)),
        }
    }
}

/// 数据库行结构
#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    pub device_id: String,
    pub user_id: String,
    pub device_type: String,
    pub device_name: Option<String>,
    pub browser_info: Option<String>,
    pub connection_id: Option<String>,
    pub current_context: Option<String>, // JSON string
    pub is_active: bool,
    pub last_heartbeat: String,
    pub created_at: String,
}

/// 业务对象
///
/// `is_active` 在读取时由 Registry 结合 300 秒心跳窗口推导，
/// 数据库中的标志位只是心跳时顺带刷新的缓存。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub user_id: String,
    pub device_type: DeviceType,
    pub device_name: Option<String>,
    pub browser_info: Option<String>,
    pub connection_id: Option<String>,
    pub current_context: Option<serde_json::Value>,
    pub is_active: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            device_id: row.device_id,
            user_id: row.user_id,
            device_type: row.device_type.parse().unwrap_or(DeviceType::Unknown),
            device_name: row.device_name,
            browser_info: row.browser_info,
            connection_id: row.connection_id,
            current_context: row.current_context.and_then(|s| serde_json::from_str(&s).ok()),
            is_active: row.is_active,
            last_heartbeat: super::parse_ts(&row.last_heartbeat),
            created_at: super::parse_ts(&row.created_at),
        }
    }
}

impl Device {
    /// 活跃判定：距上次心跳小于窗口，且持久化标志未被显式置否
    pub fn is_live_at(&self, now: DateTime<Utc>, window_secs: i64) -> bool {
        self.is_active && now - self.last_heartbeat < Duration::seconds(window_secs)
    }
}
