//! 图表数据模型
//!
//! `ChartSeries` 是缓存内共享的只读序列：底层存储为 `Arc<[T]>`，
//! 截取前缀只会生成新的视图，不会复制或改写底层数据。

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// 按天排列（新 -> 旧）的只读序列视图，前缀即最近的若干天
pub struct ChartSeries<T> {
    data: Arc<[T]>,
    len: usize,
}

impl<T> ChartSeries<T> {
    pub fn new(items: Vec<T>) -> Self {
        let len = items.len();
        Self {
            data: Arc::from(items),
            len,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// 可见长度
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    /// 截取前 `len` 个元素的视图，与当前视图共享底层存储。
    /// `len` 超过可见长度时返回 `None`。
    pub fn prefix(&self, len: usize) -> Option<Self> {
        if len > self.len {
            return None;
        }
        Some(Self {
            data: Arc::clone(&self.data),
            len,
        })
    }

    /// 两个视图是否指向同一块底层存储
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T> Clone for ChartSeries<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            len: self.len,
        }
    }
}

impl<T> Default for ChartSeries<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for ChartSeries<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> From<Vec<T>> for ChartSeries<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: fmt::Debug> fmt::Debug for ChartSeries<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq> PartialEq for ChartSeries<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Serialize> Serialize for ChartSeries<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.as_slice())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ChartSeries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::new)
    }
}

/// 成员统计（每天一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberChartDataPeriod {
    pub t: NaiveDate,
    pub joins: i64,
    pub leaves: i64,
    pub num_members: i64,
    pub max_online: i64,
}

/// 单个频道当天的消息数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessageCount {
    pub channel: String,
    pub count: i64,
}

/// 消息统计（每天一条，按频道拆分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageChartDataPeriod {
    pub t: NaiveDate,
    pub num_messages: i64,
    #[serde(default)]
    pub channels: Vec<ChannelMessageCount>,
}

/// 图表接口的响应体，同时也是缓存中存放的单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartResponse {
    /// 天数；-1 表示全部历史
    pub days: i32,
    #[serde(rename = "member_chart_data")]
    pub member_data: ChartSeries<MemberChartDataPeriod>,
    #[serde(rename = "message_chart_data")]
    pub message_data: ChartSeries<MessageChartDataPeriod>,
}

impl ChartResponse {
    pub fn new(
        days: i32,
        member_data: Vec<MemberChartDataPeriod>,
        message_data: Vec<MessageChartDataPeriod>,
    ) -> Self {
        Self {
            days,
            member_data: ChartSeries::new(member_data),
            message_data: ChartSeries::new(message_data),
        }
    }

    /// 空响应（拉取失败或无权访问时返回）
    pub fn empty() -> Self {
        Self {
            days: 0,
            member_data: ChartSeries::empty(),
            message_data: ChartSeries::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.member_data.is_empty() && self.message_data.is_empty()
    }
}
