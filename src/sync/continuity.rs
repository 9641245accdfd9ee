// src/sync/continuity.rs

use chrono::Utc;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{ContextSnapshot, SnapshotType};
use crate::storage::Database;

/// 上下文接续存储
///
/// 快照只追加、永不修改：避免多设备争写同一行，也顺带留下一份
/// 轻量历史。旧快照的清理交给外部保留作业。
#[derive(Clone)]
pub struct ContinuityStore {
    db: Database,
}

impl ContinuityStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 追加一条快照，返回新快照 id
    pub async fn save_snapshot(
        &self,
        user_id: &str,
        device_id: &str,
        snapshot_type: SnapshotType,
        context_data: Value,
        metadata: Option<Value>,
    ) -> AppResult<i64> {
        if user_id.trim().is_empty() || device_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "user_id and device_id are required".to_string(),
            ));
        }

        let context_json = serde_json::to_string(&context_data).unwrap_or_default();
        let metadata_json = metadata.map(|m| serde_json::to_string(&m).unwrap_or_default());

        let id = self
            .db
            .save_snapshot(
                user_id,
                device_id,
                snapshot_type,
                &context_json,
                metadata_json,
                Utc::now(),
            )
            .await?;

        tracing::debug!(user_id, device_id, snapshot_id = id, "context snapshot saved");
        Ok(id)
    }

    /// 最新快照，可排除某台设备自己的（接续时拿到的是别台设备的状态）。
    /// 没有快照返回 None，这是新用户的正常稳态，不是错误。
    pub async fn latest_snapshot(
        &self,
        user_id: &str,
        exclude_device_id: Option<&str>,
    ) -> AppResult<Option<ContextSnapshot>> {
        if user_id.trim().is_empty() {
            return Err(AppError::ValidationError("user_id is required".to_string()));
        }

        self.db.get_latest_snapshot(user_id, exclude_device_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use serde_json::json;

    #[tokio::test]
    async fn test_latest_snapshot_excludes_own_device() {
        let env = TestEnv::new().await;

        env.continuity
            .save_snapshot("user-1", "dev-a", SnapshotType::FullState, json!({"doc": "a"}), None)
            .await
            .unwrap();
        env.continuity
            .save_snapshot("user-1", "dev-b", SnapshotType::FullState, json!({"doc": "b"}), None)
            .await
            .unwrap();

        // B 请求接续时拿到 A 的快照，而不是 None，也不是自己的
        let snapshot = env
            .continuity
            .latest_snapshot("user-1", Some("dev-b"))
            .await
            .unwrap()
            .expect("expected device A's snapshot");
        assert_eq!(snapshot.device_id, "dev-a");
        assert_eq!(snapshot.context_data, json!({"doc": "a"}));

        // 不排除时取全局最新
        let snapshot = env
            .continuity
            .latest_snapshot("user-1", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.device_id, "dev-b");
    }

    #[tokio::test]
    async fn test_no_snapshot_is_none_not_error() {
        let env = TestEnv::new().await;

        let snapshot = env.continuity.latest_snapshot("fresh-user", None).await.unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_excluding_only_source_yields_none() {
        let env = TestEnv::new().await;

        env.continuity
            .save_snapshot("user-1", "dev-a", SnapshotType::Partial, json!({"x": 1}), None)
            .await
            .unwrap();

        let snapshot = env
            .continuity
            .latest_snapshot("user-1", Some("dev-a"))
            .await
            .unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_snapshots_are_append_only() {
        let env = TestEnv::new().await;

        let first = env
            .continuity
            .save_snapshot("user-1", "dev-a", SnapshotType::Partial, json!({"v": 1}), None)
            .await
            .unwrap();
        let second = env
            .continuity
            .save_snapshot(
                "user-1",
                "dev-a",
                SnapshotType::FullState,
                json!({"v": 2}),
                Some(json!({"reason": "handoff"})),
            )
            .await
            .unwrap();
        assert!(second > first);

        let latest = env.continuity.latest_snapshot("user-1", None).await.unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.snapshot_type, SnapshotType::FullState);
        assert_eq!(latest.metadata, Some(json!({"reason": "handoff"})));
    }
}
