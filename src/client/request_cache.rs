//! # Request Cache
//!
//! Client-side cache of list responses keyed by request fingerprint.
//!
//! ## Behavior
//!
//! - **Dedup**: concurrent `get`s of one fingerprint share one fetch. The
//!   fetch runs in its own task and callers await a `Shared` handle to it.
//! - **Staleness**: an entry older than its policy's dedup interval is stale.
//!   List entries are served forever; stale search entries are served at once
//!   while a background fetch replaces them.
//! - **Retry**: failed fetches are retried with capped exponential backoff,
//!   4xx responses excepted.
//! - **Offline**: fetches wait for connectivity before touching the network.
//! - **Prefetch**: a successful list fetch schedules the next page (and the
//!   one after when there is one). Prefetched pages never schedule more.
//! - **LRU**: at most `capacity` entries, least recently used evicted first.

use super::api::{ApiError, ListFetcher};
use super::connectivity::ConnectivityMonitor;
use super::fingerprint::ListRequest;
use super::prefetch::{PrefetchConfig, PrefetchJob, PrefetchQueue, PrefetchTarget};
use super::retry::RetryPolicy;
use crate::core::types::ListResponse;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Searches preloaded by `preload_searches` when the caller has none of its own
pub const POPULAR_SEARCHES: [&str; 5] = ["pikachu", "charizard", "blastoise", "venusaur", "mewtwo"];

/// Freshness rules for one kind of request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long an entry counts as fresh
    pub dedup_interval: Duration,

    /// Refetch in the background when a stale entry is served
    pub revalidate_if_stale: bool,

    /// Keep showing old results while new ones load
    pub keep_previous_data: bool,
}

impl CachePolicy {
    /// Plain pages: the Pokédex rarely changes
    pub fn list() -> Self {
        Self {
            dedup_interval: Duration::from_secs(5 * 60),
            revalidate_if_stale: false,
            keep_previous_data: true,
        }
    }

    /// Search results
    pub fn search() -> Self {
        Self {
            dedup_interval: Duration::from_secs(30),
            revalidate_if_stale: true,
            keep_previous_data: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestCacheConfig {
    /// Maximum number of cached responses
    pub capacity: usize,
    pub list_policy: CachePolicy,
    pub search_policy: CachePolicy,
    pub retry: RetryPolicy,
    pub prefetch: PrefetchConfig,
}

impl Default for RequestCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 150,
            list_policy: CachePolicy::list(),
            search_policy: CachePolicy::search(),
            retry: RetryPolicy::default(),
            prefetch: PrefetchConfig::default(),
        }
    }
}

impl RequestCacheConfig {
    pub fn policy_for(&self, request: &ListRequest) -> &CachePolicy {
        if request.is_search() {
            &self.search_policy
        } else {
            &self.list_policy
        }
    }
}

#[derive(Clone)]
struct ClientCacheEntry {
    response: Arc<ListResponse>,
    fetched_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOrigin {
    /// A caller is waiting for this response
    Request,
    /// Replacing a stale entry that was already served
    Revalidate,
    /// Filling the cache ahead of demand
    Prefetch,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<ListResponse>, ApiError>>>;

struct CacheInner {
    fetcher: Arc<dyn ListFetcher>,
    config: RequestCacheConfig,
    entries: Mutex<LruCache<String, ClientCacheEntry>>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    connectivity: ConnectivityMonitor,
    prefetch: PrefetchQueue,
    network_fetches: AtomicU64,
}

/// Deduplicating, prefetching cache in front of a `ListFetcher`
#[derive(Clone)]
pub struct RequestCache {
    inner: Arc<CacheInner>,
}

impl RequestCache {
    /// Create a cache. Must be called inside a tokio runtime.
    pub fn new(
        fetcher: Arc<dyn ListFetcher>,
        config: RequestCacheConfig,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);

        let inner = Arc::new_cyclic(|weak: &Weak<CacheInner>| {
            let target: Weak<dyn PrefetchTarget> = weak.clone();
            CacheInner {
                fetcher,
                config,
                entries: Mutex::new(LruCache::new(capacity)),
                in_flight: Mutex::new(HashMap::new()),
                connectivity,
                prefetch: PrefetchQueue::spawn(target),
                network_fetches: AtomicU64::new(0),
            }
        });

        Self { inner }
    }

    pub fn config(&self) -> &RequestCacheConfig {
        &self.inner.config
    }

    pub fn policy_for(&self, request: &ListRequest) -> &CachePolicy {
        self.inner.config.policy_for(request)
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    /// Cached or fetched response for `request`
    pub async fn get(&self, request: &ListRequest) -> Result<Arc<ListResponse>, ApiError> {
        let key = request.fingerprint();
        let policy = self.inner.config.policy_for(request);

        if let Some(entry) = self.inner.lookup(&key) {
            let fresh = entry.fetched_at.elapsed() < policy.dedup_interval;
            if fresh || !policy.revalidate_if_stale {
                debug!(fingerprint = %key, "Request cache hit");
                return Ok(entry.response);
            }

            debug!(fingerprint = %key, "Serving stale entry while revalidating");
            // The fetch task runs whether or not the handle is awaited
            drop(self.inner.start_fetch(key, request.clone(), FetchOrigin::Revalidate));
            return Ok(entry.response);
        }

        self.inner
            .start_fetch(key, request.clone(), FetchOrigin::Request)
            .await
    }

    /// Cached response without fetching or touching recency
    pub fn peek(&self, request: &ListRequest) -> Option<Arc<ListResponse>> {
        self.inner
            .entries
            .lock()
            .peek(&request.fingerprint())
            .map(|entry| entry.response.clone())
    }

    /// Fetch `request` into the cache unless it is already there
    pub async fn prefetch(&self, request: ListRequest) {
        Arc::clone(&self.inner).prefetch(request).await;
    }

    /// Load pages `1..=pages` concurrently, returning how many are now cached
    pub async fn warm(&self, pages: u32, limit: u32) -> usize {
        let mut cached = 0;
        let mut fetches = Vec::new();

        for page in 1..=pages {
            let request = ListRequest::new(page, limit);
            let key = request.fingerprint();
            if self.inner.contains(&key) {
                cached += 1;
            } else {
                fetches.push(self.inner.start_fetch(key, request, FetchOrigin::Prefetch));
            }
        }

        let loaded = futures::future::join_all(fetches)
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count();

        info!(pages, limit, cached = cached + loaded, "Request cache warmed");
        cached + loaded
    }

    /// Schedule first-page searches for `terms`, `stagger` apart
    pub fn preload_searches(&self, terms: &[&str], limit: u32, stagger: Duration) {
        for (index, term) in terms.iter().enumerate() {
            self.inner.prefetch.enqueue(PrefetchJob {
                request: ListRequest::new(1, limit).with_search(term),
                delay: stagger.saturating_mul(index as u32),
            });
        }
    }

    /// Drop the entry for `request`
    pub fn invalidate(&self, request: &ListRequest) -> bool {
        self.invalidate_fingerprint(&request.fingerprint())
    }

    pub fn invalidate_fingerprint(&self, fingerprint: &str) -> bool {
        self.inner.entries.lock().pop(fingerprint).is_some()
    }

    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests sent to the fetcher, retries included
    pub fn network_fetches(&self) -> u64 {
        self.inner.network_fetches.load(Ordering::Relaxed)
    }

    /// Prefetch jobs scheduled so far
    pub fn prefetches_scheduled(&self) -> u64 {
        self.inner.prefetch.scheduled()
    }
}

impl CacheInner {
    fn lookup(&self, key: &str) -> Option<ClientCacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    /// Join the in-flight fetch for `key`, or start one
    fn start_fetch(self: &Arc<Self>, key: String, request: ListRequest, origin: FetchOrigin) -> SharedFetch {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(&key) {
            debug!(fingerprint = %key, "Joining in-flight request");
            return existing.clone();
        }

        let inner = Arc::clone(self);
        let task_key = key.clone();
        // The map lock is held until the handle is inserted, so the task
        // cannot remove its entry before it exists
        let handle = tokio::spawn(async move { inner.fetch_and_store(task_key, request, origin).await });

        let shared = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ApiError::internal(format!("Fetch task failed: {}", e))))
        }
        .boxed()
        .shared();

        in_flight.insert(key, shared.clone());
        shared
    }

    async fn fetch_and_store(
        self: Arc<Self>,
        key: String,
        request: ListRequest,
        origin: FetchOrigin,
    ) -> Result<Arc<ListResponse>, ApiError> {
        if !self.connectivity.is_online() {
            info!(fingerprint = %key, "Offline, waiting for connection before fetching");
            self.connectivity.wait_for_online().await;
        }

        let result = self
            .config
            .retry
            .run(|| {
                self.network_fetches.fetch_add(1, Ordering::Relaxed);
                self.fetcher.fetch_list(&request)
            })
            .await
            .map(Arc::new);

        match &result {
            Ok(response) => {
                let entry = ClientCacheEntry {
                    response: response.clone(),
                    fetched_at: Instant::now(),
                };
                self.entries.lock().put(key.clone(), entry);

                if origin == FetchOrigin::Request {
                    let jobs = self.config.prefetch.plan(
                        &request,
                        response.data.len(),
                        &response.pagination,
                    );
                    for job in jobs {
                        self.prefetch.enqueue(job);
                    }
                }
                debug!(fingerprint = %key, origin = ?origin, "Stored response");
            }
            Err(e) => {
                warn!(fingerprint = %key, origin = ?origin, error = %e, "Fetch failed");
            }
        }

        self.in_flight.lock().remove(&key);
        result
    }
}

#[async_trait]
impl PrefetchTarget for CacheInner {
    async fn prefetch(self: Arc<Self>, request: ListRequest) {
        let key = request.fingerprint();
        let cached = self.contains(&key);
        if cached {
            debug!(fingerprint = %key, "Prefetch skipped, already cached");
            return;
        }

        let fetch = self.start_fetch(key, request, FetchOrigin::Prefetch);
        if let Err(e) = fetch.await {
            debug!(error = %e, "Prefetch failed");
        }
    }
}
