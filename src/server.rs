//! 统计服务器：组装存储、缓存、事件总线与 HTTP 服务

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{ServerConfig, StorageBackend};
use crate::error::ServerError;
use crate::http::StatsHttpServer;
use crate::infra::{Database, EventBus};
use crate::repository::{
    AggregationStore, MemoryAggregationStore, MemorySettingsStore, PgAggregationStore,
    PgSettingsStore, SettingsStore,
};
use crate::service::StatsService;

/// 内存模式下生成的演示数据
const DEMO_COMMUNITY_ID: i64 = 1;
const DEMO_HISTORY_DAYS: usize = 400;

pub struct StatsServer {
    config: ServerConfig,
    stats_service: Arc<StatsService>,
    database: Option<Arc<Database>>,
}

impl StatsServer {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        info!("🔧 初始化统计服务组件...");

        let (aggregation, settings_store, database): (
            Arc<dyn AggregationStore>,
            Arc<dyn SettingsStore>,
            Option<Arc<Database>>,
        ) = match config.storage {
            StorageBackend::Postgres => {
                info!("🔌 初始化数据库连接...");
                let database = Database::new(&config.database_url, &config.database)
                    .await
                    .map_err(|e| ServerError::Internal(format!("数据库连接失败: {}", e)))?;
                let pool = database.pool().clone();
                info!("✅ 数据库连接池初始化完成");
                (
                    Arc::new(PgAggregationStore::new(pool.clone())),
                    Arc::new(PgSettingsStore::new(pool)),
                    Some(Arc::new(database)),
                )
            }
            StorageBackend::Memory => {
                warn!("⚠️ 使用内存存储，数据不会持久化");
                let aggregation = MemoryAggregationStore::new();
                aggregation.seed_history(DEMO_COMMUNITY_ID, DEMO_HISTORY_DAYS);
                info!(
                    "📦 已生成演示数据: community_id={}, days={}",
                    DEMO_COMMUNITY_ID, DEMO_HISTORY_DAYS
                );
                (
                    Arc::new(aggregation),
                    Arc::new(MemorySettingsStore::new()),
                    None,
                )
            }
        };

        let event_bus = Arc::new(EventBus::new());
        let stats_service = Arc::new(StatsService::new(
            &config.stats,
            aggregation,
            settings_store,
            event_bus,
        ));
        info!(
            "✅ 统计服务初始化完成: chart_ttl={}s, settings_cache_ttl={}s",
            config.stats.chart_ttl_secs, config.stats.settings_cache_ttl_secs
        );

        Ok(Self {
            config,
            stats_service,
            database,
        })
    }

    /// 运行直到收到 Ctrl+C
    pub async fn run(&self) -> Result<(), ServerError> {
        info!("🚀 启动统计服务...");

        if self.config.enable_metrics {
            if crate::infra::metrics::init().is_err() {
                // 已初始化或重复调用，忽略
            } else {
                info!("📊 Prometheus 指标已启用，GET /metrics 可用");
            }
        }

        let mut background = vec![self.stats_service.spawn_invalidation_listener()];
        if let Some(database) = &self.database {
            background.push(spawn_pool_reporter(Arc::clone(database)));
        }
        info!("✅ 后台任务已启动: {} 个", background.len());

        let http = StatsHttpServer::new(
            Arc::clone(&self.stats_service),
            self.config.bind_address(),
        );
        let result = http.start(shutdown_signal()).await;

        for task in background {
            task.abort();
        }

        result.map_err(|e| {
            error!("❌ HTTP 服务异常退出: {}", e);
            ServerError::Internal(format!("HTTP 服务失败: {}", e))
        })
    }
}

/// 每 30 秒上报一次连接池状态
fn spawn_pool_reporter(database: Arc<Database>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            database.record_pool_metrics();
        }
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("👋 收到 Ctrl+C，正在关闭..."),
        Err(e) => {
            error!("❌ 监听关闭信号失败: {}", e);
            std::future::pending::<()>().await
        }
    }
}
