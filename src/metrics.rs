// src/metrics.rs

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};
use std::time::Instant;

// 定义指标
static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap()
});

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

static HEARTBEATS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "device_heartbeats_total",
        "Total number of device heartbeats"
    )
    .unwrap()
});

static NOTIFICATIONS_DELIVERED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "notifications_delivered_total",
        "Total number of notifications handed out by polls"
    )
    .unwrap()
});

static NOTIFICATIONS_ACKNOWLEDGED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "notifications_acknowledged_total",
        "Total number of client-acknowledged notifications"
    )
    .unwrap()
});

static SYNC_QUEUE_OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sync_queue_operations_total",
        "Total number of sync queue operations",
        &["operation"]
    )
    .unwrap()
});

/// 初始化指标（确保所有指标都被注册）
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&HEARTBEATS_TOTAL);
    Lazy::force(&NOTIFICATIONS_DELIVERED_TOTAL);
    Lazy::force(&NOTIFICATIONS_ACKNOWLEDGED_TOTAL);
    Lazy::force(&SYNC_QUEUE_OPERATIONS_TOTAL);
}

/// 指标中间件
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// 获取指标端点处理器
pub async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode_to_string(&metric_families)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// 指标记录辅助函数
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_heartbeat() {
        HEARTBEATS_TOTAL.inc();
    }

    pub fn record_delivered(count: u64) {
        if count > 0 {
            NOTIFICATIONS_DELIVERED_TOTAL.inc_by(count as f64);
        }
    }

    pub fn record_acknowledged(count: u64) {
        if count > 0 {
            NOTIFICATIONS_ACKNOWLEDGED_TOTAL.inc_by(count as f64);
        }
    }

    pub fn record_queue_op(operation: &str) {
        SYNC_QUEUE_OPERATIONS_TOTAL
            .with_label_values(&[operation])
            .inc();
    }
}
