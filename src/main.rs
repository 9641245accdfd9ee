// src/main.rs

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use csync_server::cli::{Cli, CliHandler, Commands};
use csync_server::config::Config;
use csync_server::handlers::{self, AppState};
use csync_server::metrics::{init_metrics, metrics_handler, metrics_middleware};
use csync_server::storage::Database;
use csync_server::sync::{ContinuityStore, DeviceRegistry, NotificationDelivery, SyncQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 初始化指标
    init_metrics();

    // 加载配置
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        Arc::new(Config::default())
    });

    tracing::info!("Starting Continuity Sync Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Server configuration: {}:{}", config.server.host, config.server.port);
    tracing::info!("Database path: {}", config.database.path);

    // 初始化数据库
    let db = Database::new(&config.database).await?;
    db.run_migrations().await?;

    // 解析命令行参数并分发
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Device(cmd)) => {
            let registry = DeviceRegistry::new(db, config.sync.clone());
            CliHandler::new(registry).handle_device_command(cmd).await?;
            Ok(())
        }
        Some(Commands::Server) | None => run_server(config, db).await,
    }
}

async fn run_server(config: Arc<Config>, db: Database) -> anyhow::Result<()> {
    // 组件全部无状态地叠在共享存储之上，任意实例可以服务任意设备的请求
    let app_state = AppState {
        registry: DeviceRegistry::new(db.clone(), config.sync.clone()),
        continuity: ContinuityStore::new(db.clone()),
        queue: SyncQueue::new(db.clone()),
        delivery: NotificationDelivery::new(db, config.sync.clone()),
    };
    tracing::info!("Continuity components initialized");

    // 构建路由
    let app = Router::new()
        // 健康检查和指标（无需认证）
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::ready_check))
        .route("/metrics", get(metrics_handler))
        .nest(
            "/api/v1",
            Router::new()
                // 设备注册与活跃状态
                .route("/devices/heartbeat", post(handlers::devices::register_or_heartbeat))
                .route("/devices/active", get(handlers::devices::get_active_devices))
                // 上下文接续
                .route("/continuity/snapshots", post(handlers::continuity::save_snapshot))
                .route("/continuity/snapshots/latest", get(handlers::continuity::get_latest_snapshot))
                // 同步队列
                .route("/sync/queue", post(handlers::sync_queue::queue_sync))
                .route("/sync/queue/pending", get(handlers::sync_queue::get_pending_syncs))
                .route("/sync/queue/:sync_id/complete", post(handlers::sync_queue::complete_sync))
                // 事件与轮询投递
                .route("/sync/events", post(handlers::poll::record_event))
                .route("/sync/poll", post(handlers::poll::poll))
                .with_state(app_state),
        )
        // 全局中间件
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // 优雅关闭
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
