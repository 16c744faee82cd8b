//! Prometheus 指标：图表缓存命中率、拉取耗时、设置缓存、事件总线等
//!
//! 通过 `init()` 安装全局 Recorder，通过 HTTP GET `/metrics` 暴露抓取端点。
//! 未初始化时 `metrics::*!` 宏为空操作，测试中无需安装 Recorder。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const COUNTER_CHART_CACHE_HIT: &str = "serverstats_chart_cache_hit_total";
const COUNTER_CHART_CACHE_MISS: &str = "serverstats_chart_cache_miss_total";
const GAUGE_CHART_CACHE_ENTRIES: &str = "serverstats_chart_cache_entries";
const COUNTER_CHART_FETCH_TOTAL: &str = "serverstats_chart_fetch_total";
const HISTOGRAM_CHART_FETCH_DURATION: &str = "serverstats_chart_fetch_duration_seconds";
const COUNTER_CHART_REQUESTS: &str = "serverstats_chart_requests_total";
const COUNTER_SETTINGS_UPDATED: &str = "serverstats_settings_updated_total";
const COUNTER_EVENT_BUS_LAGGED: &str = "serverstats_event_bus_lagged_total";
const GAUGE_DB_POOL_ACTIVE: &str = "serverstats_db_pool_active";
const GAUGE_DB_POOL_IDLE: &str = "serverstats_db_pool_idle";

/// 初始化 Prometheus 指标（安装全局 Recorder，返回 Handle 用于 HTTP 暴露）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// 渲染当前指标为 Prometheus 文本格式，供 GET /metrics 使用。
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

pub fn record_chart_cache_hit() {
    metrics::counter!(COUNTER_CHART_CACHE_HIT).increment(1);
}

pub fn record_chart_cache_miss() {
    metrics::counter!(COUNTER_CHART_CACHE_MISS).increment(1);
}

/// 更新缓存条目数（Gauge）。每次抓取 /metrics 时更新。
pub fn record_chart_cache_entries(count: usize) {
    metrics::gauge!(GAUGE_CHART_CACHE_ENTRIES).set(count as f64);
}

/// 记录一次底层拉取：按结果计数 + 耗时直方图。
pub fn record_chart_fetch(success: bool, duration_secs: f64) {
    let outcome = if success { "fetched" } else { "absent" };
    metrics::counter!(COUNTER_CHART_FETCH_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(HISTOGRAM_CHART_FETCH_DURATION).record(duration_secs);
}

/// 记录一次图表请求（按访问入口区分）。
pub fn record_chart_request(access: &'static str) {
    metrics::counter!(COUNTER_CHART_REQUESTS, "access" => access).increment(1);
}

pub fn record_settings_updated() {
    metrics::counter!(COUNTER_SETTINGS_UPDATED).increment(1);
}

/// 记录 EventBus lagged 丢失的事件数（Counter）。
pub fn record_event_bus_lagged(count: u64) {
    metrics::counter!(COUNTER_EVENT_BUS_LAGGED).increment(count);
}

/// 更新数据库连接池状态（Gauge）。
pub fn record_db_pool(active: u32, idle: u32) {
    metrics::gauge!(GAUGE_DB_POOL_ACTIVE).set(active as f64);
    metrics::gauge!(GAUGE_DB_POOL_IDLE).set(idle as f64);
}
