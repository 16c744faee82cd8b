//! HTTP 服务器 - 使用 Axum 提供统计 API

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::http::routes;
use crate::service::StatsService;

/// HTTP 服务器共享状态
#[derive(Clone)]
pub struct HttpServerState {
    pub stats_service: Arc<StatsService>,
}

/// 构建完整路由（含中间件）
pub fn build_router(state: HttpServerState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 统计 HTTP 服务器
pub struct StatsHttpServer {
    state: HttpServerState,
    bind_address: String,
}

impl StatsHttpServer {
    pub fn new(stats_service: Arc<StatsService>, bind_address: String) -> Self {
        Self {
            state: HttpServerState { stats_service },
            bind_address,
        }
    }

    /// 启动 HTTP 服务器，`shutdown` 完成后停止接受新连接并等待进行中的请求结束
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!("🌐 HTTP 统计服务启动在 {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("🛑 HTTP 统计服务已停止");
        Ok(())
    }
}
