// src/sync/registry.rs

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::SyncSettings;
use crate::error::{AppError, AppResult};
use crate::models::{Device, DeviceType};
use crate::storage::Database;
use crate::utils::DeviceTypeDetector;

/// 设备注册表
///
/// 管理设备身份与活跃状态。活跃与否不以落库标志为准，而是在每次
/// 读取时由心跳时间重新推导，服务端不保留任何跨请求的连接状态。
#[derive(Clone)]
pub struct DeviceRegistry {
    db: Database,
    settings: SyncSettings,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub device_type: Option<DeviceType>,
    pub device_name: Option<String>,
    pub browser_info: Option<String>,
    pub connection_id: Option<String>,
}

impl DeviceRegistry {
    pub fn new(db: Database, settings: SyncSettings) -> Self {
        Self { db, settings }
    }

    fn validate_ids(user_id: &str, device_id: &str) -> AppResult<()> {
        if user_id.trim().is_empty() {
            return Err(AppError::ValidationError("user_id is required".to_string()));
        }
        if device_id.trim().is_empty() {
            return Err(AppError::ValidationError("device_id is required".to_string()));
        }
        Ok(())
    }

    /// 注册设备（幂等）。未显式给出类型时从 browser_info 推断。
    pub async fn register_device(&self, user_id: &str, reg: DeviceRegistration) -> AppResult<()> {
        Self::validate_ids(user_id, &reg.device_id)?;

        let device_type = reg
            .device_type
            .or_else(|| reg.browser_info.as_deref().map(DeviceTypeDetector::detect));

        self.db
            .register_device(
                user_id,
                &reg.device_id,
                device_type.map(|t| t.to_string()),
                reg.device_name.as_deref(),
                reg.browser_info.as_deref(),
                reg.connection_id.as_deref(),
                Utc::now(),
            )
            .await?;

        tracing::debug!(user_id, device_id = %reg.device_id, "device registered");
        Ok(())
    }

    /// 心跳：首次心跳自动建档，之后刷新 last_heartbeat 与当前上下文
    pub async fn heartbeat(
        &self,
        user_id: &str,
        device_id: &str,
        current_context: Option<Value>,
    ) -> AppResult<()> {
        self.heartbeat_at(user_id, device_id, current_context, Utc::now())
            .await
    }

    async fn heartbeat_at(
        &self,
        user_id: &str,
        device_id: &str,
        current_context: Option<Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        Self::validate_ids(user_id, device_id)?;

        let context_json = current_context
            .map(|c| serde_json::to_string(&c).unwrap_or_default());

        self.db
            .touch_heartbeat(user_id, device_id, context_json, now)
            .await
    }

    /// 用户的全部设备，is_active 按心跳窗口即时推导
    pub async fn get_devices(&self, user_id: &str) -> AppResult<Vec<Device>> {
        if user_id.trim().is_empty() {
            return Err(AppError::ValidationError("user_id is required".to_string()));
        }

        let now = Utc::now();
        let mut devices = self.db.get_devices(user_id).await?;
        for device in &mut devices {
            device.is_active = device.is_live_at(now, self.settings.liveness_window_secs);
        }
        Ok(devices)
    }

    /// 仅返回活跃设备
    pub async fn get_active_devices(&self, user_id: &str) -> AppResult<Vec<Device>> {
        let devices = self.get_devices(user_id).await?;
        Ok(devices.into_iter().filter(|d| d.is_active).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_heartbeat_auto_creates_device() {
        let env = TestEnv::new().await;

        env.registry
            .heartbeat("user-1", "dev-a", Some(json!({"route": "/chat"})))
            .await
            .unwrap();

        let devices = env.registry.get_devices("user-1").await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "dev-a");
        assert!(devices[0].is_active);
        assert_eq!(devices[0].current_context, Some(json!({"route": "/chat"})));
    }

    #[tokio::test]
    async fn test_register_is_idempotent_and_keeps_heartbeat() {
        let env = TestEnv::new().await;
        let reg = DeviceRegistration {
            device_id: "dev-a".to_string(),
            device_type: Some(DeviceType::Desktop),
            device_name: Some("workbench".to_string()),
            ..Default::default()
        };

        env.registry.register_device("user-1", reg.clone()).await.unwrap();
        env.registry.heartbeat("user-1", "dev-a", None).await.unwrap();

        let before = env.registry.get_devices("user-1").await.unwrap();
        let heartbeat_before = before[0].last_heartbeat;

        // 重复注册：仍然只有一行，心跳时间不被拉回
        env.registry.register_device("user-1", reg).await.unwrap();

        let after = env.registry.get_devices("user-1").await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].last_heartbeat, heartbeat_before);
        assert_eq!(after[0].device_type, DeviceType::Desktop);
        assert_eq!(after[0].device_name.as_deref(), Some("workbench"));
    }

    #[tokio::test]
    async fn test_device_type_inferred_from_browser_info() {
        let env = TestEnv::new().await;
        let reg = DeviceRegistration {
            device_id: "dev-phone".to_string(),
            browser_info: Some(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148".to_string(),
            ),
            ..Default::default()
        };

        env.registry.register_device("user-1", reg).await.unwrap();

        let devices = env.registry.get_devices("user-1").await.unwrap();
        assert_eq!(devices[0].device_type, DeviceType::Mobile);
    }

    #[tokio::test]
    async fn test_stale_device_drops_out_of_active_list() {
        let env = TestEnv::new().await;
        let now = Utc::now();

        env.registry
            .heartbeat_at("user-1", "dev-stale", None, now - Duration::seconds(301))
            .await
            .unwrap();
        env.registry
            .heartbeat_at("user-1", "dev-fresh", None, now - Duration::seconds(299))
            .await
            .unwrap();

        let active = env.registry.get_active_devices("user-1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].device_id, "dev-fresh");

        // 全量列表两台都在，只是活跃标志不同
        let all = env.registry.get_devices("user-1").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_ids_are_validation_errors() {
        let env = TestEnv::new().await;

        let err = env.registry.heartbeat("", "dev-a", None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = env.registry.heartbeat("user-1", "  ", None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_concurrent_heartbeats_last_write_wins() {
        let env = TestEnv::new().await;

        // 同一设备的两个"标签页"同时心跳，不丢行、上下文为后写者
        let r1 = env.registry.heartbeat("user-1", "dev-a", Some(json!({"tab": 1})));
        let r2 = env.registry.heartbeat("user-1", "dev-a", Some(json!({"tab": 2})));
        let (a, b) = tokio::join!(r1, r2);
        a.unwrap();
        b.unwrap();

        let devices = env.registry.get_devices("user-1").await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].current_context.is_some());
    }
}
