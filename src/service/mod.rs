// 业务服务层模块
pub mod stats_service;

pub use stats_service::{Access, StatsService};
