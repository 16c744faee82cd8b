use serde::{Deserialize, Serialize};

/// 领域事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// 社区统计设置已更新（公开标记或忽略频道）
    StatsSettingsChanged {
        community_id: i64,
        timestamp: i64,
    },
}
