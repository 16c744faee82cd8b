//! 图表统计缓存
//!
//! - `bucket`: 请求天数 -> (缓存桶, 展示天数)
//! - `fetcher`: 未命中时从聚合存储拉取
//! - `chart_cache`: TTL 缓存，按 key 合并并发拉取
//! - `slicer`: 从缓存序列派生只读视图

pub mod bucket;
pub mod chart_cache;
pub mod fetcher;
pub mod slicer;

pub use bucket::{
    parse_requested_days, resolve, Bucket, BucketResolution, ChartKey, KeyParseError, ALL_DAYS,
    DEFAULT_DAYS, MAX_DAYS, MIN_DISPLAY_DAYS,
};
pub use chart_cache::{CacheLookup, ChartCache, ChartFetcher, FetchOutcome, DEFAULT_CHART_TTL};
pub use fetcher::{FetchError, SeriesFetcher};
pub use slicer::{slice, slice_or_clamp, SliceError};
