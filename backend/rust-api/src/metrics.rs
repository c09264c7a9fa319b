use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Upstream Metrics (content and results APIs)
    pub static ref UPSTREAM_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "upstream_calls_total",
        "Total number of calls to upstream APIs",
        &["api", "operation", "status"]
    )
    .unwrap();

    pub static ref UPSTREAM_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "upstream_call_duration_seconds",
        "Upstream API call duration in seconds",
        &["api", "operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // Cache Metrics (Redis)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Business Metrics
    pub static ref GAME_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "game_sessions_total",
        "Total number of game sessions",
        &["game", "status"]
    )
    .unwrap();

    pub static ref GAME_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "game_sessions_active",
        "Number of game sessions held in memory"
    )
    .unwrap();

    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "game_attempts_total",
        "Total number of judged attempts",
        &["game", "outcome"]
    )
    .unwrap();

    pub static ref SPINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "spinner_spins_total",
        "Total number of spinner spins",
        &["outcome"]
    )
    .unwrap();

    pub static ref RESULT_SAVES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "result_saves_total",
        "Per-participant result batch submissions",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track an upstream API call with metrics
pub async fn track_upstream_call<F, T>(
    api: &str,
    operation: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    UPSTREAM_CALLS_TOTAL
        .with_label_values(&[api, operation, status])
        .inc();

    UPSTREAM_CALL_DURATION_SECONDS
        .with_label_values(&[api, operation])
        .observe(duration);

    result
}

/// Helper: track cache operation with metrics
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}
