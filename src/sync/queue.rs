// src/sync/queue.rs

use chrono::Utc;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::SyncQueueEntry;
use crate::storage::Database;

/// 同步队列
///
/// 广播条目（to_device_id 为 NULL）不会展开成每设备一行，由消费端
/// 读取时过滤。因此多台设备可能各自看到并"完成"同一条广播——这是
/// 有意的多方投递语义，complete 是幂等的标记而不是独占认领；需要
/// 单消费者语义的调用方得自带按设备的完成记录。
#[derive(Clone)]
pub struct SyncQueue {
    db: Database,
}

impl SyncQueue {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 入队一条 pending 负载；to_device_id 省略即广播给该用户的其余设备
    pub async fn queue_sync(
        &self,
        user_id: &str,
        from_device_id: &str,
        payload: Value,
        to_device_id: Option<&str>,
    ) -> AppResult<i64> {
        if user_id.trim().is_empty() || from_device_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "user_id and from_device_id are required".to_string(),
            ));
        }

        let payload_json = serde_json::to_string(&payload).unwrap_or_default();
        let id = self
            .db
            .queue_sync(user_id, from_device_id, to_device_id, &payload_json, Utc::now())
            .await?;

        tracing::debug!(
            user_id,
            from_device_id,
            to_device_id = to_device_id.unwrap_or("<broadcast>"),
            sync_id = id,
            "sync payload queued"
        );
        Ok(id)
    }

    /// 本设备可消费的 pending 条目，最旧在前
    pub async fn pending_syncs(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> AppResult<Vec<SyncQueueEntry>> {
        if user_id.trim().is_empty() || device_id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "user_id and device_id are required".to_string(),
            ));
        }

        self.db.get_pending_syncs(user_id, device_id).await
    }

    /// 标记完成。幂等；未知 id 报 NotFound。
    pub async fn complete_sync(&self, sync_id: i64) -> AppResult<()> {
        let found = self.db.complete_sync(sync_id, Utc::now()).await?;
        if !found {
            return Err(AppError::NotFound(format!("Sync entry {} not found", sync_id)));
        }
        Ok(())
    }
}
