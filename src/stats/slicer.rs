//! 从缓存中的标准序列派生展示用的视图

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::model::ChartResponse;
use crate::stats::bucket::ALL_DAYS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SliceError {
    #[error("requested {requested} days but only {available} are cached")]
    Overflow { requested: usize, available: usize },
}

/// 截取前 `display_days` 天。
///
/// 天数与缓存一致时直接返回同一个 `Arc`；否则返回共享底层存储的新视图。
/// 缓存中的数据不足 `display_days` 时返回 [`SliceError::Overflow`]。
pub fn slice(
    cached: &Arc<ChartResponse>,
    display_days: i32,
) -> Result<Arc<ChartResponse>, SliceError> {
    if display_days == cached.days {
        return Ok(Arc::clone(cached));
    }

    let requested = display_days.max(0) as usize;
    match (
        cached.member_data.prefix(requested),
        cached.message_data.prefix(requested),
    ) {
        (Some(member_data), Some(message_data)) => Ok(Arc::new(ChartResponse {
            days: display_days,
            member_data,
            message_data,
        })),
        _ => Err(SliceError::Overflow {
            requested,
            available: available_len(cached),
        }),
    }
}

/// 同 [`slice`]，数据不足时截到可用长度（`days` 同步改为该长度）
pub fn slice_or_clamp(cached: &Arc<ChartResponse>, display_days: i32) -> Arc<ChartResponse> {
    match slice(cached, display_days) {
        Ok(view) => view,
        Err(SliceError::Overflow {
            requested,
            available,
        }) => {
            warn!(
                "⚠️ 缓存序列短于展示天数，按可用长度返回: cached_days={}, requested={}, available={}",
                cached.days, requested, available
            );
            clamp(cached, available)
        }
    }
}

fn available_len(response: &ChartResponse) -> usize {
    response.member_data.len().min(response.message_data.len())
}

fn clamp(cached: &Arc<ChartResponse>, len: usize) -> Arc<ChartResponse> {
    let len = len.min(available_len(cached));
    match (cached.member_data.prefix(len), cached.message_data.prefix(len)) {
        (Some(member_data), Some(message_data)) => Arc::new(ChartResponse {
            days: len as i32,
            member_data,
            message_data,
        }),
        _ => Arc::new(ChartResponse::empty()),
    }
}
