// src/config.rs

use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

/// 连续性协议的固定参数
///
/// 300 秒活跃窗口容忍正常的心跳抖动；首次轮询回看 30 秒；
/// 每次轮询最多投递 20 条通知，超出由 has_more 驱动客户端立即续拉。
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    pub liveness_window_secs: i64,
    pub poll_page_size: i64,
    pub first_poll_lookback_secs: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Arc<Self>> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CSYNC"))
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(Arc::new(config))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "csync.db".to_string(),
                max_connections: 10,
            },
            sync: SyncSettings::default(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            liveness_window_secs: 300,
            poll_page_size: 20,
            first_poll_lookback_secs: 30,
        }
    }
}
