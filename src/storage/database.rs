// src/storage/database.rs

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tokio::fs;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::models::*;

/// 持久层：四张逻辑表的唯一真相来源。
///
/// 所有写入都是按稳定主键的单行 upsert/update，协议的正确性只依赖
/// 存储对单条语句的原子性，不需要多行事务（服务实例无状态，可水平扩展）。
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        // 确保数据库目录存在
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::InternalError(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        // 创建连接池
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&format!("sqlite:{}?mode=rwc", config.path))
            .await
            .map_err(AppError::DatabaseError)?;

        // 启用 WAL 模式和外键约束
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> AppResult<()> {
        self.create_tables().await?;
        Ok(())
    }

    async fn create_tables(&self) -> AppResult<()> {
        // Devices 表，(device_id, user_id) 联合主键
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                device_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                device_type TEXT NOT NULL DEFAULT 'unknown',
                device_name TEXT,
                browser_info TEXT,
                connection_id TEXT,
                current_context TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_heartbeat TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (device_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Context Snapshots 表（只追加）
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS context_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                device_id TEXT NOT NULL,
                snapshot_type TEXT NOT NULL,
                context_data TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Sync Queue 表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                from_device_id TEXT NOT NULL,
                to_device_id TEXT,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                completed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Device Notifications 表（时间戳为毫秒整数，见 models/notification.rs）
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                source_device TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_data TEXT,
                created_at INTEGER NOT NULL,
                delivered INTEGER NOT NULL DEFAULT 0,
                delivered_at INTEGER,
                acknowledged INTEGER NOT NULL DEFAULT 0,
                acknowledged_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // 创建索引
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_user ON context_snapshots(user_id, id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_queue_user_status ON sync_queue(user_id, status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_window ON device_notifications(user_id, delivered, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== 设备相关 ====================

    /// 注册设备（幂等 upsert）
    ///
    /// 冲突时只刷新元信息，不触碰 last_heartbeat，重复注册不会把心跳时间拉回。
    #[allow(clippy::too_many_arguments)]
    pub async fn register_device(
        &self,
        user_id: &str,
        device_id: &str,
        device_type: Option<String>,
        device_name: Option<&str>,
        browser_info: Option<&str>,
        connection_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO devices (device_id, user_id, device_type, device_name, browser_info, connection_id, is_active, last_heartbeat, created_at)
            VALUES (?1, ?2, COALESCE(?3, 'unknown'), ?4, ?5, ?6, 1, ?7, ?7)
            ON CONFLICT (device_id, user_id) DO UPDATE SET
                device_type = COALESCE(?3, devices.device_type),
                device_name = COALESCE(?4, devices.device_name),
                browser_info = COALESCE(?5, devices.browser_info),
                connection_id = COALESCE(?6, devices.connection_id),
                is_active = 1
            "#,
        )
        .bind(device_id)
        .bind(user_id)
        .bind(device_type)
        .bind(device_name)
        .bind(browser_info)
        .bind(connection_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 心跳：刷新 last_heartbeat，顺带存储设备当前上下文。
    /// 首次心跳自动建档；同设备并发心跳后写胜出（上下文仅作参考）。
    pub async fn touch_heartbeat(
        &self,
        user_id: &str,
        device_id: &str,
        context_json: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO devices (device_id, user_id, device_type, current_context, is_active, last_heartbeat, created_at)
            VALUES (?1, ?2, 'unknown', ?3, 1, ?4, ?4)
            ON CONFLICT (device_id, user_id) DO UPDATE SET
                last_heartbeat = excluded.last_heartbeat,
                is_active = 1,
                current_context = COALESCE(?3, devices.current_context)
            "#,
        )
        .bind(device_id)
        .bind(user_id)
        .bind(context_json)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_devices(&self, user_id: &str) -> AppResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            "SELECT * FROM devices WHERE user_id = ? ORDER BY last_heartbeat DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Device::from).collect())
    }

    // ==================== 上下文快照相关 ====================

    pub async fn save_snapshot(
        &self,
        user_id: &str,
        device_id: &str,
        snapshot_type: SnapshotType,
        context_json: &str,
        metadata_json: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO context_snapshots (user_id, device_id, snapshot_type, context_data, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(snapshot_type.to_string())
        .bind(context_json)
        .bind(metadata_json)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// 最新快照按追加顺序取最后一条；表只追加，id 顺序即 created_at 顺序
    pub async fn get_latest_snapshot(
        &self,
        user_id: &str,
        exclude_device_id: Option<&str>,
    ) -> AppResult<Option<ContextSnapshot>> {
        let row = sqlx::query_as::<_, ContextSnapshotRow>(
            r#"
            SELECT * FROM context_snapshots
            WHERE user_id = ?1 AND (?2 IS NULL OR device_id != ?2)
            ORDER BY id DESC LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(exclude_device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ContextSnapshot::from))
    }

    // ==================== 同步队列相关 ====================

    pub async fn queue_sync(
        &self,
        user_id: &str,
        from_device_id: &str,
        to_device_id: Option<&str>,
        payload_json: &str,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_queue (user_id, from_device_id, to_device_id, payload, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(user_id)
        .bind(from_device_id)
        .bind(to_device_id)
        .bind(payload_json)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// 待处理条目：点对点指向本设备的，或广播（to_device_id 为 NULL）的，
    /// 永不包含本设备自己发出的；最旧在前，追赶设备按因果顺序重放。
    pub async fn get_pending_syncs(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> AppResult<Vec<SyncQueueEntry>> {
        let rows = sqlx::query_as::<_, SyncQueueEntryRow>(
            r#"
            SELECT * FROM sync_queue
            WHERE user_id = ?1 AND status = 'pending'
              AND from_device_id != ?2
              AND (to_device_id IS NULL OR to_device_id = ?2)
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SyncQueueEntry::from).collect())
    }

    /// 标记完成。幂等：重复完成保留首次的 completed_at 并仍返回 true；
    /// 未知 id 返回 false。
    pub async fn complete_sync(&self, sync_id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'completed', completed_at = COALESCE(completed_at, ?1)
            WHERE id = ?2
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(sync_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== 通知相关 ====================

    pub async fn record_notification(
        &self,
        user_id: &str,
        source_device: &str,
        event_type: &str,
        event_data_json: Option<String>,
        created_ms: i64,
    ) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO device_notifications (user_id, source_device, event_type, event_data, created_at, delivered, acknowledged)
            VALUES (?, ?, ?, ?, ?, 0, 0)
            "#,
        )
        .bind(user_id)
        .bind(source_device)
        .bind(event_type)
        .bind(event_data_json)
        .bind(created_ms)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// 轮询窗口内的未投递通知，不含本设备自己产生的
    pub async fn fetch_undelivered(
        &self,
        user_id: &str,
        requesting_device: &str,
        since_ms: i64,
        limit: i64,
    ) -> AppResult<Vec<DeviceNotification>> {
        let rows = sqlx::query_as::<_, DeviceNotificationRow>(
            r#"
            SELECT * FROM device_notifications
            WHERE user_id = ? AND source_device != ? AND delivered = 0 AND created_at >= ?
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(requesting_device)
        .bind(since_ms)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DeviceNotification::from).collect())
    }

    /// 投递即标记：被轮询带走的行立即翻转 delivered，此后不再重发。
    /// 重复标记为空操作，保留首次投递时间。
    pub async fn mark_delivered(&self, ids: &[i64], now_ms: i64) -> AppResult<()> {
        for id in ids {
            sqlx::query(
                r#"
                UPDATE device_notifications
                SET delivered = 1, delivered_at = COALESCE(delivered_at, ?1)
                WHERE id = ?2
                "#,
            )
            .bind(now_ms)
            .bind(*id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// 客户端确认，纯观测记录，不影响投递；返回命中的通知条数
    pub async fn acknowledge_notifications(&self, ids: &[i64], now_ms: i64) -> AppResult<u64> {
        let mut count = 0u64;
        for id in ids {
            let result = sqlx::query(
                r#"
                UPDATE device_notifications
                SET acknowledged = 1, acknowledged_at = COALESCE(acknowledged_at, ?1)
                WHERE id = ?2
                "#,
            )
            .bind(now_ms)
            .bind(*id)
            .execute(&self.pool)
            .await?;
            count += result.rows_affected();
        }
        Ok(count)
    }

    #[cfg(test)]
    pub async fn get_notification(&self, id: i64) -> AppResult<Option<DeviceNotification>> {
        let row = sqlx::query_as::<_, DeviceNotificationRow>(
            "SELECT * FROM device_notifications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DeviceNotification::from))
    }
}
