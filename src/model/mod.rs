//! 数据模型模块

pub mod chart;
pub mod settings;

pub use chart::{
    ChannelMessageCount, ChartResponse, ChartSeries, MemberChartDataPeriod,
    MessageChartDataPeriod,
};
pub use settings::{ChannelStats, CommunitySettings, DailyStats};
