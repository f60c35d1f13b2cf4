//! Explicit result cache for the lines pipeline.
//!
//! The dashboard asks for matchups on every page load; the cache serves the
//! last snapshot until it is older than the TTL and only then refetches.
//! Refreshes are serialized behind a separate gate, so concurrent requests
//! that find the snapshot stale wait for the single in-flight fetch instead
//! of starting their own. The snapshot lock itself is only taken briefly, so
//! `peek` and `invalidate` never wait on the network.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use super::affiliation::AffiliationTable;
use super::feed::{FeedError, LinesSource};
use super::models::LinesSnapshot;
use super::pipeline::build_matchups;

#[derive(Clone)]
pub struct LinesCache {
    source: Arc<dyn LinesSource>,
    affiliations: Arc<AffiliationTable>,
    ttl: Duration,
    fetch_last_updated: bool,
    inner: Arc<RwLock<Option<Arc<LinesSnapshot>>>>,
    /// Held for the duration of a refresh
    refresh_gate: Arc<Mutex<()>>,
}

impl LinesCache {
    pub fn new(
        source: Arc<dyn LinesSource>,
        affiliations: AffiliationTable,
        ttl: Duration,
        fetch_last_updated: bool,
    ) -> Self {
        LinesCache {
            source,
            affiliations: Arc::new(affiliations),
            ttl,
            fetch_last_updated,
            inner: Arc::new(RwLock::new(None)),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Serve the cached snapshot if still fresh, otherwise fetch a new one.
    ///
    /// A failed refresh returns the error and leaves the cache as it was; an
    /// expired snapshot is never handed out in its place.
    pub async fn get_or_refresh(&self) -> Result<Arc<LinesSnapshot>, FeedError> {
        if let Some(snap) = self.fresh_snapshot().await {
            return Ok(snap);
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while we waited for the gate.
        if let Some(snap) = self.fresh_snapshot().await {
            return Ok(snap);
        }

        match self.load().await {
            Ok(snap) => {
                let snap = Arc::new(snap);
                *self.inner.write().await = Some(snap.clone());
                Ok(snap)
            }
            Err(e) => {
                error!("Lines refresh from {} failed: {}", self.source.name(), e);
                Err(e)
            }
        }
    }

    async fn fresh_snapshot(&self) -> Option<Arc<LinesSnapshot>> {
        let guard = self.inner.read().await;
        guard
            .as_ref()
            .filter(|snap| self.is_fresh(snap, Utc::now()))
            .cloned()
    }

    /// Drop the cached snapshot so the next call refetches.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }

    /// The cached snapshot, fresh or not, without fetching.
    pub async fn peek(&self) -> Option<Arc<LinesSnapshot>> {
        self.inner.read().await.clone()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// When a snapshot fetched at `fetched_at` stops being served.
    pub fn expires_at(&self, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        fetched_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn is_fresh(&self, snap: &LinesSnapshot, now: DateTime<Utc>) -> bool {
        now < self.expires_at(snap.fetched_at)
    }

    async fn load(&self) -> Result<LinesSnapshot, FeedError> {
        let last_updated = if self.fetch_last_updated {
            Some(self.source.fetch_last_updated().await?)
        } else {
            None
        };

        let csv_text = self.source.fetch_lines_csv().await?;
        let matchups = build_matchups(&csv_text, &self.affiliations)?;
        info!(
            "Refreshed {} matchups from {}",
            matchups.len(),
            self.source.name()
        );

        Ok(LinesSnapshot {
            matchups,
            fetched_at: Utc::now(),
            last_updated,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lines::models::AffiliationRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    pub(crate) const CSV: &str = "home,road,lineopen,line,linemidweek,lineavg,linestd,linemedian,phcover,phwin\n\
                                  Ohio St.,Michigan,-3.5,-6,,-4.2,2.1,-4.0,0.42,0.38\n\
                                  Tiny College,Other U,1,1,,1,1,1,0.5,0.5\n";

    /// Canned source that counts fetches and can be switched to fail.
    pub(crate) struct StubSource {
        pub csv: Mutex<String>,
        pub fail: Mutex<bool>,
        pub delay: Mutex<Duration>,
        pub lines_calls: AtomicUsize,
        pub updated_calls: AtomicUsize,
    }

    impl StubSource {
        pub(crate) fn new(csv: &str) -> Arc<Self> {
            Arc::new(StubSource {
                csv: Mutex::new(csv.to_string()),
                fail: Mutex::new(false),
                delay: Mutex::new(Duration::ZERO),
                lines_calls: AtomicUsize::new(0),
                updated_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LinesSource for StubSource {
        async fn fetch_lines_csv(&self) -> Result<String, FeedError> {
            self.lines_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if *self.fail.lock().unwrap() {
                return Err(FeedError::Status {
                    url: "stub".into(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            Ok(self.csv.lock().unwrap().clone())
        }

        async fn fetch_last_updated(&self) -> Result<String, FeedError> {
            self.updated_calls.fetch_add(1, Ordering::SeqCst);
            Ok("Saturday Sep 6, 2025".into())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    pub(crate) fn table() -> AffiliationTable {
        AffiliationTable::from_records(vec![
            AffiliationRecord { school: "Ohio State".into(), conference: "Big Ten".into() },
            AffiliationRecord { school: "Michigan".into(), conference: "Big Ten".into() },
        ])
    }

    #[tokio::test]
    async fn test_serves_cached_snapshot_within_ttl() {
        let src = StubSource::new(CSV);
        let cache = LinesCache::new(src.clone(), table(), Duration::from_secs(3600), false);

        let a = cache.get_or_refresh().await.unwrap();
        let b = cache.get_or_refresh().await.unwrap();
        assert_eq!(src.lines_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.matchups.len(), 1);
        assert!(a.last_updated.is_none());
        assert_eq!(src.updated_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_refetches_every_call() {
        let src = StubSource::new(CSV);
        let cache = LinesCache::new(src.clone(), table(), Duration::ZERO, false);

        cache.get_or_refresh().await.unwrap();
        cache.get_or_refresh().await.unwrap();
        assert_eq!(src.lines_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let src = StubSource::new(CSV);
        let cache = LinesCache::new(src.clone(), table(), Duration::from_secs(3600), false);

        cache.get_or_refresh().await.unwrap();
        cache.invalidate().await;
        assert!(cache.peek().await.is_none());
        cache.get_or_refresh().await.unwrap();
        assert_eq!(src.lines_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_propagates_and_keeps_state() {
        let src = StubSource::new(CSV);
        let cache = LinesCache::new(src.clone(), table(), Duration::ZERO, false);

        let first = cache.get_or_refresh().await.unwrap();
        *src.fail.lock().unwrap() = true;
        assert!(cache.get_or_refresh().await.is_err());

        let kept = cache.peek().await.unwrap();
        assert!(Arc::ptr_eq(&first, &kept));
    }

    #[tokio::test]
    async fn test_malformed_csv_is_error() {
        let src = StubSource::new("home,road\nA,B\n");
        let cache = LinesCache::new(src, table(), Duration::from_secs(60), false);
        assert!(matches!(
            cache.get_or_refresh().await,
            Err(FeedError::MissingColumn(_))
        ));
        assert!(cache.peek().await.is_none());
    }

    #[tokio::test]
    async fn test_last_updated_fetched_when_enabled() {
        let src = StubSource::new(CSV);
        let cache = LinesCache::new(src.clone(), table(), Duration::from_secs(60), true);
        let snap = cache.get_or_refresh().await.unwrap();
        assert_eq!(snap.last_updated.as_deref(), Some("Saturday Sep 6, 2025"));
        assert_eq!(src.updated_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let src = StubSource::new(CSV);
        let cache = LinesCache::new(src.clone(), table(), Duration::from_secs(3600), false);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = cache.clone();
                tokio::spawn(async move { c.get_or_refresh().await.map(|s| s.matchups.len()) })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 1);
        }
        assert_eq!(src.lines_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_peek_and_invalidate_do_not_wait_on_refresh() {
        let src = StubSource::new(CSV);
        *src.delay.lock().unwrap() = Duration::from_millis(500);
        let cache = LinesCache::new(src.clone(), table(), Duration::from_secs(3600), false);

        let refreshing = {
            let c = cache.clone();
            tokio::spawn(async move { c.get_or_refresh().await.map(|s| s.matchups.len()) })
        };
        while src.lines_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let started = Instant::now();
        assert!(cache.peek().await.is_none());
        cache.invalidate().await;
        assert!(started.elapsed() < Duration::from_millis(250));

        assert_eq!(refreshing.await.unwrap().unwrap(), 1);
        assert!(cache.peek().await.is_some());
    }

    #[test]
    fn test_expires_at_saturates() {
        let cache = LinesCache::new(StubSource::new(CSV), table(), Duration::MAX, false);
        let now = Utc::now();
        assert!(cache.expires_at(now) > now);
    }
}
