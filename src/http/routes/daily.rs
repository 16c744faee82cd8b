//! 最近 24 小时概览
//!
//! 路由：
//! - GET /api/cp/{community_id}/stats/daily
//! - GET /api/public/{community_id}/stats/daily

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use crate::error::Result;
use crate::http::routes::parse_community_id;
use crate::http::HttpServerState;
use crate::model::DailyStats;
use crate::service::Access;

pub fn create_route() -> Router<HttpServerState> {
    Router::new()
        .route("/api/cp/{community_id}/stats/daily", get(cp_daily))
        .route("/api/public/{community_id}/stats/daily", get(public_daily))
}

async fn cp_daily(
    State(state): State<HttpServerState>,
    Path(community_id): Path<String>,
) -> Result<Json<Option<DailyStats>>> {
    let community_id = parse_community_id(&community_id)?;
    let stats = state
        .stats_service
        .daily_stats(community_id, Access::ControlPanel)
        .await?;
    Ok(Json(stats))
}

/// 未公开的社区返回 `null`
async fn public_daily(
    State(state): State<HttpServerState>,
    Path(community_id): Path<String>,
) -> Result<Json<Option<DailyStats>>> {
    let community_id = parse_community_id(&community_id)?;
    let stats = state
        .stats_service
        .daily_stats(community_id, Access::Public)
        .await?;
    Ok(Json(stats))
}
