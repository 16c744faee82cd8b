//! 图表缓存
//!
//! ```text
//! get(key)
//!   │
//!   ├─ 标记 Ready{id}，moka 中有同 id 的条目 ─▶ Hit
//!   │
//!   ├─ Pending（已有拉取在进行）────────────▶ 等待同一个 fetch 的结果
//!   │
//!   └─ 无标记 / moka 中已过期 ─▶ 插入 Pending，tokio::spawn(fetch)
//!                                 │
//!                                 ├─ Fetched ─▶ 写入 moka，标记改为 Ready{id}
//!                                 └─ Absent  ─▶ 移除 Pending（不缓存失败）
//! ```
//!
//! 数据与 TTL 由 moka 管理；`slots` 只记录进行中的拉取和每个 key 当前有效的
//! 拉取 id。失效操作删除标记后，旧 id 的数据即使仍在 moka 中也不会再被返回。
//!
//! 每个 key 同一时刻最多只有一个拉取任务。拉取在独立任务中执行，
//! 调用方被取消不会中断拉取，结果仍会写入缓存。

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::infra::metrics;
use crate::model::ChartResponse;
use crate::stats::bucket::ChartKey;

/// 默认 TTL：1 分钟
pub const DEFAULT_CHART_TTL: Duration = Duration::from_secs(60);

/// 一次拉取的结果
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(ChartResponse),
    /// 底层聚合失败，没有可用数据
    Absent,
}

/// 缓存未命中时的数据来源
#[async_trait]
pub trait ChartFetcher: Send + Sync + 'static {
    async fn fetch(&self, key: ChartKey) -> FetchOutcome;
}

/// 缓存查询结果
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// 命中且未过期
    Hit(Arc<ChartResponse>),
    /// 未命中，本次（或并发中的同一次）拉取成功
    Fetched(Arc<ChartResponse>),
    /// 未命中，拉取失败
    Absent,
}

impl CacheLookup {
    pub fn response(&self) -> Option<&Arc<ChartResponse>> {
        match self {
            CacheLookup::Hit(response) | CacheLookup::Fetched(response) => Some(response),
            CacheLookup::Absent => None,
        }
    }

    pub fn into_response(self) -> Option<Arc<ChartResponse>> {
        match self {
            CacheLookup::Hit(response) | CacheLookup::Fetched(response) => Some(response),
            CacheLookup::Absent => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

type SharedFetch = Shared<BoxFuture<'static, CacheLookup>>;

#[derive(Clone)]
enum Slot {
    Pending { id: u64, fetch: SharedFetch },
    /// moka 中 id 相同的条目才有效
    Ready { id: u64 },
}

impl Slot {
    fn is_pending(&self, fetch_id: u64) -> bool {
        matches!(self, Slot::Pending { id, .. } if *id == fetch_id)
    }

    fn is_ready(&self, fetch_id: u64) -> bool {
        matches!(self, Slot::Ready { id } if *id == fetch_id)
    }
}

#[derive(Clone)]
struct ReadyEntry {
    id: u64,
    response: Arc<ChartResponse>,
}

/// 在标记锁内决定下一步
enum Claim {
    Await(SharedFetch),
    /// 标记已被其他拉取刷新，重新读取
    Retry,
}

struct Inner {
    slots: Arc<DashMap<ChartKey, Slot>>,
    ready: Cache<ChartKey, ReadyEntry>,
    fetcher: Arc<dyn ChartFetcher>,
    next_fetch_id: AtomicU64,
}

/// 带 TTL、按 key 合并并发拉取的图表缓存
#[derive(Clone)]
pub struct ChartCache {
    inner: Arc<Inner>,
}

impl ChartCache {
    pub fn new(ttl: Duration, fetcher: Arc<dyn ChartFetcher>) -> Self {
        let slots: Arc<DashMap<ChartKey, Slot>> = Arc::new(DashMap::new());

        // 过期淘汰时顺带清掉对应的 Ready 标记
        let markers = Arc::clone(&slots);
        let ready = Cache::builder()
            .time_to_live(ttl)
            .support_invalidation_closures()
            .eviction_listener(move |key: Arc<ChartKey>, entry: ReadyEntry, cause| {
                if cause.was_evicted() {
                    markers.remove_if(&*key, |_, slot| slot.is_ready(entry.id));
                }
            })
            .build();

        Self {
            inner: Arc::new(Inner {
                slots,
                ready,
                fetcher,
                next_fetch_id: AtomicU64::new(1),
            }),
        }
    }

    /// 查询缓存，未命中或已过期时触发（或加入）拉取
    pub async fn get(&self, key: ChartKey) -> CacheLookup {
        let fetch = loop {
            let current = self.inner.slots.get(&key).map(|slot| slot.clone());
            let expected = match current {
                Some(Slot::Pending { fetch, .. }) => {
                    debug!("⏳ 等待进行中的图表拉取: key={}", key);
                    break fetch;
                }
                Some(Slot::Ready { id }) => {
                    if let Some(entry) = self.inner.ready.get(&key).await {
                        if entry.id == id {
                            metrics::record_chart_cache_hit();
                            return CacheLookup::Hit(entry.response);
                        }
                    }
                    debug!("⌛ 图表缓存已过期: key={}", key);
                    Some(id)
                }
                None => None,
            };

            match self.claim(key, expected) {
                Claim::Await(fetch) => break fetch,
                Claim::Retry => continue,
            }
        };

        metrics::record_chart_cache_miss();
        fetch.await
    }

    /// 标记仍是 `expected` 时启动拉取；已有 Pending 则加入
    fn claim(&self, key: ChartKey, expected: Option<u64>) -> Claim {
        match self.inner.slots.entry(key) {
            Entry::Occupied(mut entry) => {
                let stale = match entry.get() {
                    Slot::Pending { fetch, .. } => return Claim::Await(fetch.clone()),
                    Slot::Ready { id } => Some(*id) == expected,
                };
                if !stale {
                    return Claim::Retry;
                }

                let (id, fetch) = self.start_fetch(key);
                entry.insert(Slot::Pending {
                    id,
                    fetch: fetch.clone(),
                });
                Claim::Await(fetch)
            }
            Entry::Vacant(entry) => {
                let (id, fetch) = self.start_fetch(key);
                entry.insert(Slot::Pending {
                    id,
                    fetch: fetch.clone(),
                });
                Claim::Await(fetch)
            }
        }
    }

    /// 启动拉取任务。调用方持有该 key 的分片锁，插入 Pending 之后才释放，
    /// 所以任务完成时一定能看到自己的 Pending。
    fn start_fetch(&self, key: ChartKey) -> (u64, SharedFetch) {
        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        debug!("🔄 开始拉取图表数据: key={}, fetch_id={}", key, id);

        let handle = tokio::spawn(async move {
            let _guard = PendingGuard {
                inner: Arc::clone(&inner),
                key,
                id,
            };

            let started = Instant::now();
            let outcome = inner.fetcher.fetch(key).await;
            metrics::record_chart_fetch(
                matches!(outcome, FetchOutcome::Fetched(_)),
                started.elapsed().as_secs_f64(),
            );

            inner.settle(key, id, outcome).await
        });

        let fetch = async move {
            match handle.await {
                Ok(lookup) => lookup,
                Err(e) => {
                    error!("❌ 图表拉取任务异常退出: key={}, error={}", key, e);
                    CacheLookup::Absent
                }
            }
        }
        .boxed()
        .shared();

        (id, fetch)
    }

    /// 删除单个 key（包括进行中的拉取；其结果不会再写入缓存）
    pub async fn invalidate(&self, key: &ChartKey) {
        self.inner.slots.remove(key);
        self.inner.ready.invalidate(key).await;
    }

    /// 删除某个社区的全部缓存
    pub fn invalidate_community(&self, community_id: i64) -> usize {
        let before = self.inner.slots.len();
        self.inner
            .slots
            .retain(|key, _| key.community_id != community_id);
        let removed = before.saturating_sub(self.inner.slots.len());

        // 标记已删除，残留数据不会再被返回；这里只是提前释放
        if let Err(e) = self
            .inner
            .ready
            .invalidate_entries_if(move |key, _| key.community_id == community_id)
        {
            warn!(
                "⚠️ 清除 moka 图表条目失败: community_id={}, error={}",
                community_id, e
            );
        }

        if removed > 0 {
            debug!(
                "🗑️ 清除社区图表缓存: community_id={}, removed={}",
                community_id, removed
            );
        }
        removed
    }

    pub fn invalidate_all(&self) {
        self.inner.slots.clear();
        self.inner.ready.invalidate_all();
    }

    /// 有效条目数：进行中的拉取 + 未过期的结果
    pub fn len(&self) -> usize {
        let mut pending = 0;
        let mut ready_keys = Vec::new();
        for slot in self.inner.slots.iter() {
            match slot.value() {
                Slot::Pending { .. } => pending += 1,
                Slot::Ready { .. } => ready_keys.push(*slot.key()),
            }
        }
        pending
            + ready_keys
                .iter()
                .filter(|key| self.inner.ready.contains_key(*key))
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    async fn settle(&self, key: ChartKey, id: u64, outcome: FetchOutcome) -> CacheLookup {
        match outcome {
            FetchOutcome::Fetched(response) => {
                let response = Arc::new(response);
                if self.is_current(key, id) {
                    self.ready
                        .insert(
                            key,
                            ReadyEntry {
                                id,
                                response: Arc::clone(&response),
                            },
                        )
                        .await;
                    // 写入期间被失效的话标记已不在，这条数据不会被读到
                    if let Some(mut slot) = self.slots.get_mut(&key) {
                        if slot.is_pending(id) {
                            *slot = Slot::Ready { id };
                        }
                    }
                } else {
                    debug!("🚫 拉取期间缓存已失效，结果不写回: key={}", key);
                }
                CacheLookup::Fetched(response)
            }
            FetchOutcome::Absent => {
                self.remove_pending(key, id);
                CacheLookup::Absent
            }
        }
    }

    fn is_current(&self, key: ChartKey, id: u64) -> bool {
        self.slots
            .get(&key)
            .map(|slot| slot.is_pending(id))
            .unwrap_or(false)
    }

    fn remove_pending(&self, key: ChartKey, id: u64) {
        self.slots.remove_if(&key, |_, slot| slot.is_pending(id));
    }
}

/// 拉取任务结束（包括 panic）时移除仍属于自己的 Pending，避免该 key 永远等待
struct PendingGuard {
    inner: Arc<Inner>,
    key: ChartKey,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner.remove_pending(self.key, self.id);
    }
}
