//! GET /metrics - Prometheus 抓取端点

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::HttpServerState;
use crate::infra::metrics;

/// GET /metrics：返回 Prometheus 文本格式指标，渲染前刷新缓存条目数。
/// 若未初始化指标（init 未调用），返回 503。
pub async fn metrics_handler(State(state): State<HttpServerState>) -> Response {
    metrics::record_chart_cache_entries(state.stats_service.chart_cache().len());

    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}
