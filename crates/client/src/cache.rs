//! Read-through cache for backend collections.
//!
//! Entries are keyed by resource kind plus a scope (whole collection, one
//! server page, one search, one record). Freshness is a fixed TTL. Mutations
//! call [`ResourceCache::invalidate`] for their kind, which drops every scope
//! of that kind at once.
//!
//! Concurrent reads of the same key share one outstanding fetch. Each fetch
//! carries an id; a result is only written back if its slot still points at
//! that id, so an invalidation that lands mid-fetch is never undone by the
//! late response.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use petadmin_shared::{ApiError, RecordId, ResourceKind};
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Page { page: u64, size: u64 },
    Search { keyword: String, page: u64, size: u64 },
    Record(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub scope: Scope,
}

impl CacheKey {
    pub fn all(kind: ResourceKind) -> Self {
        Self {
            kind,
            scope: Scope::All,
        }
    }

    pub fn page(kind: ResourceKind, page: u64, size: u64) -> Self {
        Self {
            kind,
            scope: Scope::Page { page, size },
        }
    }

    pub fn search(kind: ResourceKind, keyword: &str, page: u64, size: u64) -> Self {
        Self {
            kind,
            scope: Scope::Search {
                keyword: keyword.trim().to_lowercase(),
                page,
                size,
            },
        }
    }

    pub fn record(kind: ResourceKind, id: RecordId) -> Self {
        Self {
            kind,
            scope: Scope::Record(id),
        }
    }
}

/// A cached value and when it was captured.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub captured_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.captured_at) < ttl
    }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>, ApiError>>>;

struct InFlight<T> {
    id: u64,
    fetch: SharedFetch<T>,
}

struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    in_flight: Option<InFlight<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entry: None,
            in_flight: None,
        }
    }
}

struct Inner<T> {
    slots: HashMap<CacheKey, Slot<T>>,
    last_fetch_id: u64,
}

/// Per-key TTL cache with fetch coalescing.
///
/// Create one per process (or per test) and share it behind an `Arc`.
pub struct ResourceCache<T> {
    ttl: Duration,
    inner: Mutex<Inner<T>>,
}

impl<T: Send + Sync + 'static> ResourceCache<T> {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                last_fetch_id: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value if fresh, otherwise run `fetcher` (or join the
    /// fetch already running for `key`) and cache its result.
    ///
    /// A failed fetch leaves any previous entry in place.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<Arc<T>, ApiError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.fetch(key, fetcher, false).await
    }

    /// Like [`ResourceCache::get_or_fetch`] but ignores freshness. The old
    /// entry stays readable until the new value arrives.
    pub async fn refresh<F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<Arc<T>, ApiError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.fetch(key, fetcher, true).await
    }

    async fn fetch<F, Fut>(&self, key: CacheKey, fetcher: F, force: bool) -> Result<Arc<T>, ApiError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (id, fetch) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let slot = inner.slots.entry(key.clone()).or_default();

            if !force {
                if let Some(entry) = &slot.entry {
                    if entry.is_fresh(self.ttl, Instant::now()) {
                        tracing::debug!(kind = %key.kind, scope = ?key.scope, "cache hit");
                        return Ok(entry.value.clone());
                    }
                }
            }

            match &slot.in_flight {
                Some(in_flight) => {
                    tracing::debug!(kind = %key.kind, scope = ?key.scope, "joining in-flight fetch");
                    (in_flight.id, in_flight.fetch.clone())
                }
                None => {
                    inner.last_fetch_id += 1;
                    let id = inner.last_fetch_id;
                    tracing::debug!(kind = %key.kind, scope = ?key.scope, id, "cache miss; fetching");
                    let fetch = fetcher().map(|result| result.map(Arc::new)).boxed().shared();
                    slot.in_flight = Some(InFlight {
                        id,
                        fetch: fetch.clone(),
                    });
                    (id, fetch)
                }
            }
        };

        let result = fetch.await;
        self.settle(&key, id, &result);
        result
    }

    /// Write a finished fetch back, unless the slot moved on in the meantime.
    fn settle(&self, key: &CacheKey, id: u64, result: &Result<Arc<T>, ApiError>) {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(key) else {
            tracing::debug!(kind = %key.kind, id, "discarding result of invalidated fetch");
            return;
        };
        match &slot.in_flight {
            Some(in_flight) if in_flight.id == id => {}
            // Another waiter already settled it, or an invalidation detached it.
            _ => return,
        }
        slot.in_flight = None;

        match result {
            Ok(value) => {
                slot.entry = Some(CacheEntry {
                    value: value.clone(),
                    captured_at: Instant::now(),
                });
            }
            Err(err) => {
                tracing::warn!(kind = %key.kind, scope = ?key.scope, error = %err, "fetch failed; keeping previous entry");
            }
        }
    }

    /// Fresh value for `key`, without fetching.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<T>> {
        let inner = self.inner.lock();
        let entry = inner.slots.get(key)?.entry.as_ref()?;
        entry
            .is_fresh(self.ttl, Instant::now())
            .then(|| entry.value.clone())
    }

    /// Last value stored for `key`, fresh or not.
    pub fn peek_stale(&self, key: &CacheKey) -> Option<Arc<T>> {
        let inner = self.inner.lock();
        inner.slots.get(key)?.entry.as_ref().map(|e| e.value.clone())
    }

    /// Drop every entry of `kind` and detach its in-flight fetches.
    pub fn invalidate(&self, kind: ResourceKind) {
        let mut inner = self.inner.lock();
        let before = inner.slots.len();
        inner.slots.retain(|key, _| key.kind != kind);
        tracing::debug!(%kind, dropped = before - inner.slots.len(), "invalidated");
    }

    pub fn invalidate_all(&self) {
        self.inner.lock().slots.clear();
        tracing::debug!("invalidated all resource kinds");
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .slots
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + Sync + 'static> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
