// src/test_utils.rs

//! 测试辅助工具
//!
//! 在临时 SQLite 数据库上搭建完整组件栈

use tempfile::TempDir;

use crate::config::{Config, DatabaseConfig};
use crate::storage::Database;
use crate::sync::{ContinuityStore, DeviceRegistry, NotificationDelivery, SyncQueue};

/// 测试环境
pub struct TestEnv {
    pub db: Database,
    pub registry: DeviceRegistry,
    pub continuity: ContinuityStore,
    pub queue: SyncQueue,
    pub delivery: NotificationDelivery,
    _temp_dir: TempDir, // 保持 TempDir 存活
}

impl TestEnv {
    /// 创建新的测试环境
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = Config::default();
        let db_config = DatabaseConfig {
            path: db_path.to_string_lossy().to_string(),
            max_connections: 1,
        };

        let db = Database::new(&db_config).await.unwrap();
        db.run_migrations().await.unwrap();

        let registry = DeviceRegistry::new(db.clone(), config.sync.clone());
        let continuity = ContinuityStore::new(db.clone());
        let queue = SyncQueue::new(db.clone());
        let delivery = NotificationDelivery::new(db.clone(), config.sync.clone());

        Self {
            db,
            registry,
            continuity,
            queue,
            delivery,
            _temp_dir: temp_dir,
        }
    }
}
