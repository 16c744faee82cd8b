use async_trait::async_trait;
use serverstats::model::ChartResponse;
use serverstats::stats::{Bucket, CacheLookup, ChartCache, ChartFetcher, ChartKey, FetchOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Fetch,
    Absent,
    Panic,
}

/// 每次拉取前先通知 `started`，再等待 `gate` 放行
struct GatedFetcher {
    calls: AtomicUsize,
    started: Notify,
    gate: Semaphore,
    mode: Mode,
}

impl GatedFetcher {
    fn open() -> Arc<Self> {
        Self::build(Semaphore::MAX_PERMITS, Mode::Fetch)
    }

    fn closed() -> Arc<Self> {
        Self::build(0, Mode::Fetch)
    }

    fn closed_absent() -> Arc<Self> {
        Self::build(0, Mode::Absent)
    }

    fn panicking() -> Arc<Self> {
        Self::build(Semaphore::MAX_PERMITS, Mode::Panic)
    }

    fn build(permits: usize, mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            gate: Semaphore::new(permits),
            mode,
        })
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartFetcher for GatedFetcher {
    async fn fetch(&self, key: ChartKey) -> FetchOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as i32;
        self.started.notify_one();
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        match self.mode {
            Mode::Fetch => {
                FetchOutcome::Fetched(ChartResponse::new(key.days() + n * 1000, vec![], vec![]))
            }
            Mode::Absent => FetchOutcome::Absent,
            Mode::Panic => panic!("aggregation exploded"),
        }
    }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_fetch() {
    let fetcher = GatedFetcher::closed();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(7, Bucket::Days(30));

    let callers: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(key).await })
        })
        .collect();

    fetcher.started.notified().await;
    // 让其余调用方都进入等待
    tokio::time::sleep(Duration::from_millis(50)).await;
    fetcher.release(1);

    let mut responses = Vec::new();
    for caller in callers {
        let lookup = caller.await.unwrap();
        responses.push(lookup.into_response().unwrap());
    }

    assert_eq!(fetcher.calls(), 1);
    assert!(responses.iter().all(|r| Arc::ptr_eq(r, &responses[0])));
    assert_eq!(responses[0].days, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_absent_outcome() {
    let fetcher = GatedFetcher::closed_absent();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(8, Bucket::All);

    let callers: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(key).await })
        })
        .collect();

    fetcher.started.notified().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    fetcher.release(1);

    for caller in callers {
        assert!(matches!(caller.await.unwrap(), CacheLookup::Absent));
    }
    assert_eq!(fetcher.calls(), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_repeated_gets_are_idempotent() {
    let fetcher = GatedFetcher::open();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(1, Bucket::All);

    let first = cache.get(key).await.into_response().unwrap();
    let second = cache.get(key).await.into_response().unwrap();
    let third = cache.get(key).await.into_response().unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(*first, *second);
    assert_eq!(*second, *third);
}

// TTL 由 moka 按真实时钟判断，不受 tokio 暂停时钟影响
#[tokio::test]
async fn test_refetch_after_ttl() {
    let fetcher = GatedFetcher::open();
    let cache = ChartCache::new(Duration::from_millis(300), fetcher.clone());
    let key = ChartKey::new(1, Bucket::Days(365));

    let first = cache.get(key).await;
    assert!(matches!(first, CacheLookup::Fetched(_)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.get(key).await.is_hit());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let refreshed = cache.get(key).await;
    assert!(matches!(refreshed, CacheLookup::Fetched(_)));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(refreshed.response().unwrap().days, 365 + 1000);
    assert!(cache.get(key).await.is_hit());
}

#[tokio::test]
async fn test_cancelled_caller_still_populates_cache() {
    let fetcher = GatedFetcher::closed();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(3, Bucket::Days(7));

    let caller = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(key).await })
    };
    fetcher.started.notified().await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    fetcher.release(1);

    // 等待中的拉取或已写入的结果，都不会触发第二次拉取
    let lookup = cache.get(key).await;
    assert!(lookup.response().is_some());
    assert!(cache.get(key).await.is_hit());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_invalidate_during_fetch_discards_result() {
    let fetcher = GatedFetcher::closed();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(5, Bucket::Days(30));

    let caller = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(key).await })
    };
    fetcher.started.notified().await;

    assert_eq!(cache.invalidate_community(5), 1);
    fetcher.release(1);

    // 进行中的调用方仍拿到结果，但结果不会写回缓存
    assert!(matches!(caller.await.unwrap(), CacheLookup::Fetched(_)));
    assert!(cache.is_empty());

    fetcher.release(1);
    assert!(matches!(cache.get(key).await, CacheLookup::Fetched(_)));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_panicking_fetch_releases_key() {
    let fetcher = GatedFetcher::panicking();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(9, Bucket::All);

    assert!(matches!(cache.get(key).await, CacheLookup::Absent));
    assert!(cache.is_empty());

    assert!(matches!(cache.get(key).await, CacheLookup::Absent));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_superseded_fetch_does_not_overwrite_newer_result() {
    let fetcher = GatedFetcher::closed();
    let cache = ChartCache::new(Duration::from_secs(60), fetcher.clone());
    let key = ChartKey::new(6, Bucket::Days(7));

    let stale = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(key).await })
    };
    fetcher.started.notified().await;
    cache.invalidate(&key).await;

    // 失效后的新拉取先完成，旧拉取随后完成也不能覆盖它
    let fresh = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(key).await })
    };
    fetcher.started.notified().await;
    fetcher.release(2);

    let stale = stale.await.unwrap().into_response().unwrap();
    let fresh = fresh.await.unwrap().into_response().unwrap();
    assert_ne!(stale.days, fresh.days);

    let cached = cache.get(key).await;
    assert!(cached.is_hit());
    assert!(Arc::ptr_eq(cached.response().unwrap(), &fresh));
    assert_eq!(fetcher.calls(), 2);
}
