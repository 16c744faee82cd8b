//! 请求天数归一化
//!
//! 任意天数请求都被映射到少数几个固定的缓存桶（7 / 30 / 365 / 全部），
//! 同一个桶的数据只计算一次，再由 [`crate::stats::slicer`] 截取展示长度。

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 全部历史
pub const ALL_DAYS: i32 = -1;
/// 最小展示天数
pub const MIN_DISPLAY_DAYS: i32 = 7;
/// 未指定 `days` 时的默认值
pub const DEFAULT_DAYS: i32 = 7;
/// 单次请求允许的最大天数
pub const MAX_DAYS: i32 = 365;

const KEY_PREFIX: &str = "charts";

/// 缓存桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Days(i32),
    All,
}

impl Bucket {
    pub fn from_days(days: i32) -> Self {
        if days == ALL_DAYS {
            Bucket::All
        } else {
            Bucket::Days(days)
        }
    }

    /// 桶对应的天数，`All` 为 -1
    pub fn days(self) -> i32 {
        match self {
            Bucket::Days(days) => days,
            Bucket::All => ALL_DAYS,
        }
    }
}

/// 归一化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketResolution {
    /// 用于缓存 key 和拉取数据的天数
    pub cache_key_days: i32,
    /// 返回给调用方的天数
    pub display_days: i32,
}

impl BucketResolution {
    pub fn bucket(&self) -> Bucket {
        Bucket::from_days(self.cache_key_days)
    }
}

/// 把请求天数映射到缓存桶。
///
/// 小于 7 的请求保留原值作为缓存 key，但展示天数被抬到 7；
/// 这种情况下缓存中的序列可能短于展示天数，由 slicer 处理。
pub fn resolve(requested_days: i32) -> BucketResolution {
    let mut display_days = requested_days.max(MIN_DISPLAY_DAYS);
    let mut cache_key_days = requested_days;

    if requested_days != 30 && requested_days != 365 && requested_days > MIN_DISPLAY_DAYS {
        cache_key_days = ALL_DAYS;
        display_days = ALL_DAYS;
    }

    BucketResolution {
        cache_key_days,
        display_days,
    }
}

/// 解析查询参数 `days`，结果限制在 `[1, 365]`。
/// 缺省、空串或无法解析时使用默认值 7。
pub fn parse_requested_days(raw: Option<&str>) -> i32 {
    let days = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_DAYS as i64);

    days.clamp(1, MAX_DAYS as i64) as i32
}

/// 缓存 key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChartKey {
    pub community_id: i64,
    pub bucket: Bucket,
}

impl ChartKey {
    pub fn new(community_id: i64, bucket: Bucket) -> Self {
        Self {
            community_id,
            bucket,
        }
    }

    pub fn days(&self) -> i32 {
        self.bucket.days()
    }
}

/// 格式：`charts:{community_id}:{days}`
impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", KEY_PREFIX, self.community_id, self.days())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("invalid cache key format: {0}")]
    Format(String),
    #[error("invalid community id in cache key: {0}")]
    CommunityId(String),
    #[error("invalid days in cache key: {0}")]
    Days(String),
}

impl FromStr for ChartKey {
    type Err = KeyParseError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != 3 || parts[0] != KEY_PREFIX {
            return Err(KeyParseError::Format(key.to_string()));
        }

        let community_id = parts[1]
            .parse::<i64>()
            .map_err(|_| KeyParseError::CommunityId(key.to_string()))?;
        let days = parts[2]
            .parse::<i32>()
            .map_err(|_| KeyParseError::Days(key.to_string()))?;

        Ok(Self::new(community_id, Bucket::from_days(days)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_requests_keep_key_and_floor_display() {
        for requested in 1..7 {
            let r = resolve(requested);
            assert_eq!(r.display_days, 7, "requested={}", requested);
            assert_eq!(r.cache_key_days, requested, "requested={}", requested);
        }
    }

    #[test]
    fn test_week_bucket() {
        assert_eq!(
            resolve(7),
            BucketResolution {
                cache_key_days: 7,
                display_days: 7
            }
        );
    }

    #[test]
    fn test_other_requests_collapse_to_all() {
        for requested in (8..365).filter(|d| *d != 30) {
            let r = resolve(requested);
            assert_eq!(r.cache_key_days, ALL_DAYS, "requested={}", requested);
            assert_eq!(r.display_days, ALL_DAYS, "requested={}", requested);
            assert_eq!(r.bucket(), Bucket::All);
        }
    }

    #[test]
    fn test_month_and_year_buckets() {
        let month = resolve(30);
        assert_eq!((month.cache_key_days, month.display_days), (30, 30));

        let year = resolve(365);
        assert_eq!((year.cache_key_days, year.display_days), (365, 365));
        assert_eq!(year.bucket(), Bucket::Days(365));
    }

    #[test]
    fn test_parse_requested_days() {
        assert_eq!(parse_requested_days(None), 7);
        assert_eq!(parse_requested_days(Some("")), 7);
        assert_eq!(parse_requested_days(Some("abc")), 7);
        assert_eq!(parse_requested_days(Some("30")), 30);
        assert_eq!(parse_requested_days(Some("1000")), 365);
        assert_eq!(parse_requested_days(Some("0")), 1);
        assert_eq!(parse_requested_days(Some("-5")), 1);
        assert_eq!(resolve(parse_requested_days(Some("1000"))).bucket(), Bucket::Days(365));
    }

    #[test]
    fn test_chart_key_format_and_parse() {
        let key = ChartKey::new(1234, Bucket::All);
        assert_eq!(key.to_string(), "charts:1234:-1");
        assert_eq!("charts:1234:-1".parse::<ChartKey>().unwrap(), key);
        assert_eq!(
            "charts:99:30".parse::<ChartKey>().unwrap(),
            ChartKey::new(99, Bucket::Days(30))
        );

        assert!(matches!("charts:1".parse::<ChartKey>(), Err(KeyParseError::Format(_))));
        assert!(matches!("charts:x:7".parse::<ChartKey>(), Err(KeyParseError::CommunityId(_))));
        assert!(matches!("charts:1:y".parse::<ChartKey>(), Err(KeyParseError::Days(_))));
    }
}
