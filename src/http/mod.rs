//! HTTP 服务器模块 - 使用 Axum 提供统计 API
//!
//! 功能包括：
//! - 图表数据接口（控制面板 / 公开页面）
//! - 最近 24 小时概览接口
//! - 社区统计设置接口
//! - `/metrics`、`/health`

pub mod routes;
pub mod server;

pub use server::{build_router, HttpServerState, StatsHttpServer};
