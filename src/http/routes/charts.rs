//! 图表数据路由
//!
//! 路由：
//! - GET /api/cp/{community_id}/stats/charts?days=N
//! - GET /api/public/{community_id}/stats/charts?days=N

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use std::collections::HashMap;

use crate::error::Result;
use crate::http::routes::parse_community_id;
use crate::http::HttpServerState;
use crate::model::ChartResponse;
use crate::service::Access;
use crate::stats::parse_requested_days;

pub fn create_route() -> Router<HttpServerState> {
    Router::new()
        .route("/api/cp/{community_id}/stats/charts", get(cp_charts))
        .route("/api/public/{community_id}/stats/charts", get(public_charts))
}

async fn cp_charts(
    State(state): State<HttpServerState>,
    Path(community_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ChartResponse>> {
    charts(state, &community_id, &params, Access::ControlPanel).await
}

async fn public_charts(
    State(state): State<HttpServerState>,
    Path(community_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ChartResponse>> {
    charts(state, &community_id, &params, Access::Public).await
}

async fn charts(
    state: HttpServerState,
    community_id: &str,
    params: &HashMap<String, String>,
    access: Access,
) -> Result<Json<ChartResponse>> {
    let community_id = parse_community_id(community_id)?;
    let days = parse_requested_days(params.get("days").map(String::as_str));

    let response = state
        .stats_service
        .chart_data(community_id, Some(days), access)
        .await?;

    // 序列是共享视图，clone 不复制数据
    Ok(Json(ChartResponse::clone(&response)))
}
