//! 存储层
//!
//! - `AggregationStore`: 已聚合的每日统计（只读）
//! - `SettingsStore`: 社区统计设置
//!
//! 各有一个 PostgreSQL 实现和一个内存实现（开发 / 测试用）。

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CommunitySettings, DailyStats, MemberChartDataPeriod, MessageChartDataPeriod};

pub mod aggregation_repo;
pub mod memory;
pub mod settings_repo;

pub use aggregation_repo::PgAggregationStore;
pub use memory::{MemoryAggregationStore, MemorySettingsStore};
pub use settings_repo::PgSettingsStore;

/// 每日统计数据来源
///
/// 序列按日期从新到旧排列，每天一条；`days = -1` 表示全部保留的历史。
#[async_trait]
pub trait AggregationStore: Send + Sync {
    /// 成员数序列
    async fn retrieve_member_series(
        &self,
        community_id: i64,
        days: i32,
    ) -> Result<Vec<MemberChartDataPeriod>>;

    /// 消息数序列（按频道拆分）
    async fn retrieve_message_series(
        &self,
        community_id: i64,
        days: i32,
    ) -> Result<Vec<MessageChartDataPeriod>>;

    /// 最近 24 小时概览
    async fn retrieve_daily_stats(&self, community_id: i64) -> Result<DailyStats>;
}

/// 社区统计设置存储
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// 读取设置；未配置过的社区返回默认值
    async fn get(&self, community_id: i64) -> Result<CommunitySettings>;

    /// 写入设置（存在则覆盖公开标记与忽略频道）
    async fn upsert(&self, settings: &CommunitySettings) -> Result<()>;
}
