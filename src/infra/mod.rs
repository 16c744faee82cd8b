// Infrastructure layer - 基础设施层
// 数据库连接池、事件总线、Prometheus 指标

pub mod database;
pub mod event_bus;
pub mod metrics;

pub use database::Database;
pub use event_bus::EventBus;
