// src/sync/delivery.rs

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::SyncSettings;
use crate::error::{AppError, AppResult};
use crate::models::DeviceNotification;
use crate::storage::Database;

/// 通知投递协议（轮询式）
///
/// poll 本身就是投递动作：被返回的行立即翻转 delivered，之后无论
/// 客户端是否确认都不再重发——至少一次而非恰好一次。确认(ack)只是
/// 观测记录，用于排查投递延迟，不影响任何下游状态。
#[derive(Clone)]
pub struct NotificationDelivery {
    db: Database,
    settings: SyncSettings,
}

#[derive(Debug, Serialize)]
pub struct PollResult {
    pub events: Vec<DeviceNotification>,
    pub has_more: bool,
    pub next_check_ts: i64,
}

impl NotificationDelivery {
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

    /// 记录一条跨设备事件，等待其余设备的轮询带走
    pub async fn record_event(
        &self,
        user_id: &str,
        source_device: &str,
        event_type: &str,
        event_data: Option<Value>,
    ) -> AppResult<i64> {
        self.record_event_at(
            user_id,
            source_device,
            event_type,
            event_data,
            Utc::now().timestamp_millis(),
        )
        .await
    }

    async fn record_event_at(
        &self,
        user_id: &str,
        source_device: &str,
        event_type: &str,
        event_data: Option<Value>,
        created_ms: i64,
    ) -> AppResult<i64> {
        Self::validate_ids(user_id, source_device)?;
        if event_type.trim().is_empty() {
            return Err(AppError::ValidationError("event_type is required".to_string()));
        }

        let data_json = event_data.map(|d| serde_json::to_string(&d).unwrap_or_default());
        self.db
            .record_notification(user_id, source_device, event_type, data_json, created_ms)
            .await
    }

    /// 轮询：窗口内、未投递、非本设备产生的通知，最多一页（20 条），
    /// 按 created_at 升序。返回的行随即标记已投递。
    pub async fn poll(
        &self,
        user_id: &str,
        device_id: &str,
        last_check_ms: Option<i64>,
    ) -> AppResult<PollResult> {
        Self::validate_ids(user_id, device_id)?;

        // 游标取在读之前：与本次轮询竞争的写入会落进下一个窗口
        let now_ms = Utc::now().timestamp_millis();
        let since_ms = last_check_ms
            .unwrap_or(now_ms - self.settings.first_poll_lookback_secs * 1000);
        let page_size = self.settings.poll_page_size;

        let mut events = self
            .db
            .fetch_undelivered(user_id, device_id, since_ms, page_size)
            .await?;

        if !events.is_empty() {
            let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
            self.db.mark_delivered(&ids, now_ms).await?;
            for event in &mut events {
                event.delivered = true;
                event.delivered_at.get_or_insert(now_ms);
            }
        }

        // 满页说明后面可能还有积压，客户端应立即续拉而不是等下个周期
        let has_more = events.len() as i64 == page_size;

        Ok(PollResult {
            events,
            has_more,
            next_check_ts: now_ms,
        })
    }

    /// 客户端确认；返回命中的通知条数
    pub async fn acknowledge(&self, event_ids: &[i64]) -> AppResult<u64> {
        if event_ids.is_empty() {
            return Ok(0);
        }
        self.db
            .acknowledge_notifications(event_ids, Utc::now().timestamp_millis())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use serde_json::json;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_no_self_delivery() {
        let env = TestEnv::new().await;

        env.delivery
            .record_event("user-1", "dev-a", "doc_opened", Some(json!({"doc": 7})))
            .await
            .unwrap();

        // 事件源设备自己永远轮询不到
        let own = env.delivery.poll("user-1", "dev-a", Some(0)).await.unwrap();
        assert!(own.events.is_empty());

        // 别的设备能拿到
        let other = env.delivery.poll("user-1", "dev-b", Some(0)).await.unwrap();
        assert_eq!(other.events.len(), 1);
        assert_eq!(other.events[0].event_type, "doc_opened");
        assert_eq!(other.events[0].source_device, "dev-a");
        assert!(other.events[0].delivered);
    }

    #[tokio::test]
    async fn test_delivered_flag_sticks_without_ack() {
        let env = TestEnv::new().await;

        env.delivery
            .record_event("user-1", "dev-a", "state_changed", None)
            .await
            .unwrap();

        let first = env.delivery.poll("user-1", "dev-b", Some(0)).await.unwrap();
        assert_eq!(first.events.len(), 1);

        // 同一窗口再轮询也为空：投递过就不再重发，与是否确认无关
        let second = env.delivery.poll("user-1", "dev-b", Some(0)).await.unwrap();
        assert!(second.events.is_empty());
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_pagination_drains_45_as_20_20_5() {
        let env = TestEnv::new().await;

        for i in 0..45 {
            env.delivery
                .record_event("user-1", "dev-a", "evt", Some(json!({"seq": i})))
                .await
                .unwrap();
        }

        let mut seen = HashSet::new();
        let mut page_sizes = Vec::new();
        let mut has_more_flags = Vec::new();

        for _ in 0..3 {
            let page = env.delivery.poll("user-1", "dev-b", Some(0)).await.unwrap();
            page_sizes.push(page.events.len());
            has_more_flags.push(page.has_more);
            for event in &page.events {
                assert!(seen.insert(event.id), "duplicate delivery of {}", event.id);
            }
        }

        assert_eq!(page_sizes, vec![20, 20, 5]);
        assert_eq!(has_more_flags, vec![true, true, false]);
        assert_eq!(seen.len(), 45);
    }

    #[tokio::test]
    async fn test_events_ordered_ascending_within_page() {
        let env = TestEnv::new().await;

        for i in 0..5 {
            env.delivery
                .record_event("user-1", "dev-a", "evt", Some(json!({"seq": i})))
                .await
                .unwrap();
        }

        let page = env.delivery.poll("user-1", "dev-b", Some(0)).await.unwrap();
        assert!(page
            .events
            .windows(2)
            .all(|w| (w[0].created_at, w[0].id) <= (w[1].created_at, w[1].id)));
    }

    #[tokio::test]
    async fn test_first_poll_lookback_window() {
        let env = TestEnv::new().await;
        let now_ms = Utc::now().timestamp_millis();

        // 一条 60 秒前的旧事件，一条刚发生的
        env.delivery
            .record_event_at("user-1", "dev-a", "old", None, now_ms - 60_000)
            .await
            .unwrap();
        env.delivery
            .record_event_at("user-1", "dev-a", "fresh", None, now_ms - 1_000)
            .await
            .unwrap();

        // 不带 last_check 的首次轮询只回看 30 秒
        let page = env.delivery.poll("user-1", "dev-b", None).await.unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].event_type, "fresh");

        // 显式给出更早的游标就能拿到旧事件
        let page = env
            .delivery
            .poll("user-1", "dev-b", Some(now_ms - 120_000))
            .await
            .unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].event_type, "old");
    }

    #[tokio::test]
    async fn test_acknowledge_is_observational_and_idempotent() {
        let env = TestEnv::new().await;

        let id = env
            .delivery
            .record_event("user-1", "dev-a", "evt", None)
            .await
            .unwrap();
        env.delivery.poll("user-1", "dev-b", Some(0)).await.unwrap();

        let count = env.delivery.acknowledge(&[id, 9999]).await.unwrap();
        assert_eq!(count, 1);

        let first_ack = env.db.get_notification(id).await.unwrap().unwrap();
        assert!(first_ack.acknowledged);

        // 重复确认保留首次时间戳
        env.delivery.acknowledge(&[id]).await.unwrap();
        let second_ack = env.db.get_notification(id).await.unwrap().unwrap();
        assert_eq!(second_ack.acknowledged_at, first_ack.acknowledged_at);

        assert_eq!(env.delivery.acknowledge(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_handoff_scenario() {
        let env = TestEnv::new().await;
        let t0 = Utc::now().timestamp_millis();

        // 设备 A 心跳后产生一个事件
        env.registry.heartbeat("user-1", "dev-a", None).await.unwrap();
        env.delivery
            .record_event("user-1", "dev-a", "chat_message", Some(json!({"text": "hi"})))
            .await
            .unwrap();

        // 设备 B 以 t0 为游标轮询，必须带回该事件且无积压
        let page = env.delivery.poll("user-1", "dev-b", Some(t0)).await.unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].event_type, "chat_message");
        assert!(!page.has_more);

        // 紧接着的第二次轮询对同一窗口必须为空
        let again = env.delivery.poll("user-1", "dev-b", Some(t0)).await.unwrap();
        assert!(again.events.is_empty());
    }

    #[tokio::test]
    async fn test_notifications_scoped_per_user() {
        let env = TestEnv::new().await;

        env.delivery
            .record_event("user-1", "dev-a", "evt", None)
            .await
            .unwrap();

        let other = env.delivery.poll("user-2", "dev-b", Some(0)).await.unwrap();
        assert!(other.events.is_empty());
    }
}
