use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 社区统计设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySettings {
    pub community_id: i64,
    /// 是否允许未登录用户查看统计
    pub public: bool,
    /// 不计入消息统计的频道
    pub ignored_channels: BTreeSet<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommunitySettings {
    /// 默认设置（未配置过的社区）：不公开，无忽略频道
    pub fn new(community_id: i64) -> Self {
        Self {
            community_id,
            public: false,
            ignored_channels: BTreeSet::new(),
            updated_at: None,
        }
    }

    /// 逗号分隔的频道列表（数据库存储格式）
    pub fn ignored_channels_csv(&self) -> String {
        self.ignored_channels
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// 解析逗号分隔的频道列表，忽略空项和无法解析的项
    pub fn parse_ignored_channels(csv: &str) -> BTreeSet<i64> {
        csv.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

/// 单个频道最近 24 小时的消息数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub name: String,
    pub count: i64,
}

/// 最近 24 小时概览
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DailyStats {
    pub channel_messages: Vec<ChannelStats>,
    pub joined_day: i64,
    pub left_day: i64,
    pub online_now: i64,
    pub total_members_now: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_channels_csv_roundtrip() {
        let parsed = CommunitySettings::parse_ignored_channels("3, 1,,abc,2");
        assert_eq!(parsed.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);

        let mut settings = CommunitySettings::new(7);
        settings.ignored_channels.insert(20);
        settings.ignored_channels.insert(10);
        assert_eq!(settings.ignored_channels_csv(), "10,20");
        assert!(!settings.public);
    }
}
