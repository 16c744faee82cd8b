//! 社区统计设置
//!
//! 路由：GET / POST /api/cp/{community_id}/stats/settings

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::http::routes::parse_community_id;
use crate::http::HttpServerState;
use crate::model::CommunitySettings;

pub fn create_route() -> Router<HttpServerState> {
    Router::new().route(
        "/api/cp/{community_id}/stats/settings",
        get(get_settings).post(update_settings),
    )
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub ignore_channels: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub community_id: i64,
    pub public: bool,
    pub ignore_channels: Vec<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<CommunitySettings> for SettingsResponse {
    fn from(settings: CommunitySettings) -> Self {
        Self {
            community_id: settings.community_id,
            public: settings.public,
            ignore_channels: settings.ignored_channels.into_iter().collect(),
            updated_at: settings.updated_at,
        }
    }
}

async fn get_settings(
    State(state): State<HttpServerState>,
    Path(community_id): Path<String>,
) -> Result<Json<SettingsResponse>> {
    let community_id = parse_community_id(&community_id)?;
    let settings = state.stats_service.settings(community_id).await?;
    Ok(Json(settings.into()))
}

async fn update_settings(
    State(state): State<HttpServerState>,
    Path(community_id): Path<String>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>> {
    let community_id = parse_community_id(&community_id)?;

    info!(
        "⚙️ 更新社区统计设置: community_id={}, public={}",
        community_id, request.public
    );

    let settings = state
        .stats_service
        .update_settings(community_id, request.public, request.ignore_channels)
        .await?;
    Ok(Json(settings.into()))
}
