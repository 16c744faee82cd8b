//! 缓存未命中时从聚合存储拉取两条序列

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::error::ServerError;
use crate::model::ChartResponse;
use crate::repository::AggregationStore;
use crate::stats::bucket::{ChartKey, KeyParseError};
use crate::stats::chart_cache::{ChartFetcher, FetchOutcome};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid cache key: {0}")]
    InvalidKey(#[from] KeyParseError),
    #[error("failed retrieving member chart data: {0}")]
    MemberSeries(#[source] ServerError),
    #[error("failed retrieving message chart data: {0}")]
    MessageSeries(#[source] ServerError),
}

/// 成员序列 + 消息序列拉取器
pub struct SeriesFetcher {
    store: Arc<dyn AggregationStore>,
}

impl SeriesFetcher {
    pub fn new(store: Arc<dyn AggregationStore>) -> Self {
        Self { store }
    }

    /// 拉取两条序列，任意一条失败都不返回部分数据
    pub async fn try_fetch(&self, key: ChartKey) -> Result<ChartResponse, FetchError> {
        let days = key.days();

        let member_data = self
            .store
            .retrieve_member_series(key.community_id, days)
            .await
            .map_err(FetchError::MemberSeries)?;

        let message_data = self
            .store
            .retrieve_message_series(key.community_id, days)
            .await
            .map_err(FetchError::MessageSeries)?;

        debug!(
            "📈 图表数据拉取完成: key={}, member_points={}, message_points={}",
            key,
            member_data.len(),
            message_data.len()
        );

        Ok(ChartResponse::new(days, member_data, message_data))
    }

    /// 按字符串形式的 key 拉取（`charts:{community_id}:{days}`）
    pub async fn fetch_raw_key(&self, raw_key: &str) -> FetchOutcome {
        match raw_key.parse::<ChartKey>() {
            Ok(key) => self.fetch(key).await,
            Err(e) => {
                error!(cache_key = raw_key, "❌ [serverstats] 无效的缓存 key: {}", e);
                FetchOutcome::Absent
            }
        }
    }
}

#[async_trait]
impl ChartFetcher for SeriesFetcher {
    async fn fetch(&self, key: ChartKey) -> FetchOutcome {
        match self.try_fetch(key).await {
            Ok(response) => FetchOutcome::Fetched(response),
            Err(e) => {
                error!(cache_key = %key, "❌ 图表数据拉取失败: {}", e);
                FetchOutcome::Absent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryAggregationStore;
    use crate::stats::bucket::Bucket;

    #[tokio::test]
    async fn test_fetch_both_series() {
        let store = Arc::new(MemoryAggregationStore::new());
        store.seed_history(42, 40);
        let fetcher = SeriesFetcher::new(store.clone());

        let response = fetcher
            .try_fetch(ChartKey::new(42, Bucket::Days(30)))
            .await
            .unwrap();

        assert_eq!(response.days, 30);
        assert_eq!(response.member_data.len(), 30);
        assert_eq!(response.message_data.len(), 30);
    }

    #[tokio::test]
    async fn test_failure_yields_absent() {
        let store = Arc::new(MemoryAggregationStore::new());
        store.seed_history(42, 40);
        store.set_unavailable(true);
        let fetcher = SeriesFetcher::new(store.clone());

        let outcome = fetcher.fetch(ChartKey::new(42, Bucket::All)).await;
        assert!(matches!(outcome, FetchOutcome::Absent));

        let err = fetcher
            .try_fetch(ChartKey::new(42, Bucket::All))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MemberSeries(_)));
    }

    #[tokio::test]
    async fn test_malformed_raw_key() {
        let store = Arc::new(MemoryAggregationStore::new());
        let fetcher = SeriesFetcher::new(store.clone());

        assert!(matches!(
            fetcher.fetch_raw_key("charts:oops").await,
            FetchOutcome::Absent
        ));
        assert_eq!(store.member_calls(), 0);

        assert!(matches!(
            fetcher.fetch_raw_key("charts:42:7").await,
            FetchOutcome::Fetched(_)
        ));
        assert_eq!(store.member_calls(), 1);
    }
}
