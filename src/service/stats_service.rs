//! 统计服务：权限判断 + 图表缓存 + 社区设置

use chrono::Utc;
use moka::future::Cache;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StatsConfig;
use crate::domain::events::DomainEvent;
use crate::error::{Result, ServerError};
use crate::infra::{metrics, EventBus};
use crate::model::{ChartResponse, CommunitySettings, DailyStats};
use crate::repository::{AggregationStore, SettingsStore};
use crate::stats::{
    resolve, slice_or_clamp, ChartCache, ChartKey, SeriesFetcher, DEFAULT_DAYS, MAX_DAYS,
};

/// 请求来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// 控制面板（上游已完成鉴权）
    ControlPanel,
    /// 公开页面，受社区 `public` 设置限制
    Public,
}

impl Access {
    pub fn as_str(self) -> &'static str {
        match self {
            Access::ControlPanel => "cp",
            Access::Public => "public",
        }
    }
}

pub struct StatsService {
    chart_cache: ChartCache,
    aggregation: Arc<dyn AggregationStore>,
    settings_store: Arc<dyn SettingsStore>,
    /// 社区设置缓存，设置更新时失效
    settings_cache: Cache<i64, CommunitySettings>,
    event_bus: Arc<EventBus>,
}

impl StatsService {
    pub fn new(
        config: &StatsConfig,
        aggregation: Arc<dyn AggregationStore>,
        settings_store: Arc<dyn SettingsStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let fetcher = Arc::new(SeriesFetcher::new(Arc::clone(&aggregation)));
        let settings_cache = Cache::builder()
            .max_capacity(config.settings_cache_capacity)
            .time_to_live(config.settings_cache_ttl())
            .build();

        Self {
            chart_cache: ChartCache::new(config.chart_ttl(), fetcher),
            aggregation,
            settings_store,
            settings_cache,
            event_bus,
        }
    }

    pub fn chart_cache(&self) -> &ChartCache {
        &self.chart_cache
    }

    /// 图表数据
    ///
    /// `requested_days` 缺省为 7，超出 `[1, 365]` 时截断。
    /// 底层拉取失败返回空响应，只有读取社区设置失败才返回错误。
    pub async fn chart_data(
        &self,
        community_id: i64,
        requested_days: Option<i32>,
        access: Access,
    ) -> Result<Arc<ChartResponse>> {
        metrics::record_chart_request(access.as_str());

        if !self.can_view(community_id, access).await? {
            debug!(
                "🔒 社区统计未公开，返回空数据: community_id={}",
                community_id
            );
            return Ok(Arc::new(ChartResponse::empty()));
        }

        let requested = requested_days
            .unwrap_or(DEFAULT_DAYS)
            .clamp(1, MAX_DAYS);
        let resolution = resolve(requested);
        let key = ChartKey::new(community_id, resolution.bucket());

        let lookup = self.chart_cache.get(key).await;
        let hit = lookup.is_hit();
        match lookup.into_response() {
            Some(cached) => {
                debug!(
                    "📊 图表数据: key={}, requested={}, display_days={}, hit={}",
                    key, requested, resolution.display_days, hit
                );
                Ok(slice_or_clamp(&cached, resolution.display_days))
            }
            None => Ok(Arc::new(ChartResponse::empty())),
        }
    }

    /// 最近 24 小时概览；公开访问未公开的社区返回 `None`
    pub async fn daily_stats(
        &self,
        community_id: i64,
        access: Access,
    ) -> Result<Option<DailyStats>> {
        if !self.can_view(community_id, access).await? {
            return Ok(None);
        }

        let stats = self.aggregation.retrieve_daily_stats(community_id).await?;
        Ok(Some(stats))
    }

    /// 社区设置（带缓存）
    pub async fn settings(&self, community_id: i64) -> Result<CommunitySettings> {
        let store = Arc::clone(&self.settings_store);
        self.settings_cache
            .try_get_with(community_id, async move { store.get(community_id).await })
            .await
            .map_err(|e: Arc<ServerError>| (*e).clone())
    }

    /// 更新社区设置，并清除该社区的图表缓存
    pub async fn update_settings(
        &self,
        community_id: i64,
        public: bool,
        ignored_channels: Vec<i64>,
    ) -> Result<CommunitySettings> {
        let settings = CommunitySettings {
            community_id,
            public,
            ignored_channels: ignored_channels.into_iter().collect(),
            updated_at: Some(Utc::now()),
        };

        self.settings_store.upsert(&settings).await?;
        self.settings_cache.invalidate(&community_id).await;
        let removed = self.chart_cache.invalidate_community(community_id);
        metrics::record_settings_updated();

        info!(
            "⚙️ 社区统计设置已更新: community_id={}, public={}, ignored_channels={}, removed_charts={}",
            community_id,
            settings.public,
            settings.ignored_channels.len(),
            removed
        );

        let event = DomainEvent::StatsSettingsChanged {
            community_id,
            timestamp: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.event_bus.publish(event) {
            // 没有订阅者
            warn!("⚠️ 发布设置变更事件失败: community_id={}, error={}", community_id, e);
        }

        Ok(settings)
    }

    /// 订阅事件总线，收到设置变更时清除对应社区的缓存。
    /// 服务被释放或事件总线关闭后任务退出。
    pub fn spawn_invalidation_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            info!("👂 统计缓存失效监听已启动");
            loop {
                let received = rx.recv().await;
                let Some(service) = weak.upgrade() else {
                    break;
                };

                match received {
                    Ok(DomainEvent::StatsSettingsChanged { community_id, .. }) => {
                        service.settings_cache.invalidate(&community_id).await;
                        let removed = service.chart_cache.invalidate_community(community_id);
                        debug!(
                            "🗑️ 收到设置变更事件: community_id={}, removed_charts={}",
                            community_id, removed
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // 丢失的事件无法得知涉及哪些社区
                        warn!("⚠️ 事件总线消费滞后，丢失 {} 条事件，清空全部缓存", skipped);
                        metrics::record_event_bus_lagged(skipped);
                        service.settings_cache.invalidate_all();
                        service.chart_cache.invalidate_all();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("👋 统计缓存失效监听已退出");
        })
    }

    /// 两种入口都会读取设置，读取失败直接返回错误
    async fn can_view(&self, community_id: i64, access: Access) -> Result<bool> {
        let settings = self.settings(community_id).await?;
        Ok(access == Access::ControlPanel || settings.public)
    }
}
