//! HTTP 路由模块
//!
//! 路由结构：
//! - `/api/cp/{community_id}/stats/*` - 控制面板接口（上游已完成鉴权）
//!   - `charts?days=N` - 图表数据
//!   - `daily` - 最近 24 小时概览
//!   - `settings` - 读取 / 更新统计设置
//! - `/api/public/{community_id}/stats/*` - 公开接口（受社区 `public` 设置限制）
//!   - `charts?days=N`
//!   - `daily`
//! - `/metrics`、`/health`

pub mod charts;
pub mod daily;
pub mod health;
pub mod metrics;
pub mod settings;

use axum::{routing::get, Router};

use crate::error::{Result, ServerError};
use crate::http::HttpServerState;

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .route("/health", get(health::health_handler))
        .merge(charts::create_route()) // /api/{cp,public}/{id}/stats/charts
        .merge(daily::create_route()) // /api/{cp,public}/{id}/stats/daily
        .merge(settings::create_route()) // /api/cp/{id}/stats/settings
}

/// 解析路径中的社区 ID
pub(crate) fn parse_community_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ServerError::Validation(format!("无效的 community_id: {}", raw)))
}
