//! 内存存储（开发模式 / 测试）

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Result, ServerError};
use crate::model::{
    ChannelMessageCount, ChannelStats, CommunitySettings, DailyStats, MemberChartDataPeriod,
    MessageChartDataPeriod,
};
use crate::repository::{AggregationStore, SettingsStore};

/// 内存中的每日统计
///
/// 序列按新 -> 旧存放，`days > 0` 时返回前 `days` 条。
#[derive(Default)]
pub struct MemoryAggregationStore {
    members: DashMap<i64, Vec<MemberChartDataPeriod>>,
    messages: DashMap<i64, Vec<MessageChartDataPeriod>>,
    daily: DashMap<i64, DailyStats>,
    unavailable: AtomicBool,
    member_calls: AtomicUsize,
    message_calls: AtomicUsize,
}

impl MemoryAggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成截止今天、共 `days` 天的样例数据
    pub fn seed_history(&self, community_id: i64, days: usize) {
        let today = Utc::now().date_naive();
        let mut members = Vec::with_capacity(days);
        let mut messages = Vec::with_capacity(days);

        for i in 0..days {
            let t = today - ChronoDuration::days(i as i64);
            let n = (days - i) as i64;
            members.push(MemberChartDataPeriod {
                t,
                joins: n % 5,
                leaves: n % 3,
                num_members: 100 + n,
                max_online: 10 + n % 7,
            });
            let channels = vec![
                ChannelMessageCount {
                    channel: "general".to_string(),
                    count: n * 2,
                },
                ChannelMessageCount {
                    channel: "random".to_string(),
                    count: n,
                },
            ];
            messages.push(MessageChartDataPeriod {
                t,
                num_messages: channels.iter().map(|c| c.count).sum(),
                channels,
            });
        }

        let daily = DailyStats {
            channel_messages: vec![
                ChannelStats {
                    name: "general".to_string(),
                    count: days as i64 * 2,
                },
                ChannelStats {
                    name: "random".to_string(),
                    count: days as i64,
                },
            ],
            joined_day: members.first().map(|m| m.joins).unwrap_or_default(),
            left_day: members.first().map(|m| m.leaves).unwrap_or_default(),
            online_now: members.first().map(|m| m.max_online).unwrap_or_default(),
            total_members_now: members.first().map(|m| m.num_members).unwrap_or_default(),
        };

        self.members.insert(community_id, members);
        self.messages.insert(community_id, messages);
        self.daily.insert(community_id, daily);
    }

    /// 模拟存储不可用：所有读取都返回 `ServerError::Database`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn member_calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    async fn before_read(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServerError::Database(
                "aggregation store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn take_days<T: Clone>(series: Option<&Vec<T>>, days: i32) -> Vec<T> {
    match series {
        Some(series) if days > 0 => series.iter().take(days as usize).cloned().collect(),
        Some(series) => series.clone(),
        None => Vec::new(),
    }
}

#[async_trait]
impl AggregationStore for MemoryAggregationStore {
    async fn retrieve_member_series(
        &self,
        community_id: i64,
        days: i32,
    ) -> Result<Vec<MemberChartDataPeriod>> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        Ok(take_days(
            self.members.get(&community_id).as_deref(),
            days,
        ))
    }

    async fn retrieve_message_series(
        &self,
        community_id: i64,
        days: i32,
    ) -> Result<Vec<MessageChartDataPeriod>> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        Ok(take_days(
            self.messages.get(&community_id).as_deref(),
            days,
        ))
    }

    async fn retrieve_daily_stats(&self, community_id: i64) -> Result<DailyStats> {
        self.before_read().await?;
        Ok(self
            .daily
            .get(&community_id)
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}

/// 内存中的社区设置
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: DashMap<i64, CommunitySettings>,
    failing: AtomicBool,
    get_calls: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储故障
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServerError::Database("settings store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, community_id: i64) -> Result<CommunitySettings> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .settings
            .get(&community_id)
            .map(|s| s.clone())
            .unwrap_or_else(|| CommunitySettings::new(community_id)))
    }

    async fn upsert(&self, settings: &CommunitySettings) -> Result<()> {
        self.check()?;
        self.settings.insert(settings.community_id, settings.clone());
        Ok(())
    }
}
