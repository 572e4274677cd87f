//! # Client Library
//!
//! Consumer-side access to the gateway's `GET /api/pokemons` endpoint.
//!
//! ## Layers
//! 1. **ApiClient**: typed HTTP calls with user-facing error messages
//! 2. **RequestCache**: fingerprinted LRU with in-flight deduplication, per-mode
//!    staleness policies, retry with backoff, connectivity gating and prefetch
//! 3. **PokemonFeed**: infinite-scroll state with a request-ordering guard

pub mod api;
pub mod connectivity;
pub mod feed;
pub mod fingerprint;
pub mod prefetch;
pub mod request_cache;
pub mod retry;

pub use api::{ApiClient, ApiError, ApiErrorKind, ListFetcher};
pub use connectivity::ConnectivityMonitor;
pub use feed::{FeedSnapshot, FeedUpdate, PokemonFeed};
pub use fingerprint::{ListRequest, FINGERPRINT_PREFIX};
pub use prefetch::{PrefetchConfig, PrefetchJob, PrefetchQueue, PrefetchTarget};
pub use request_cache::{CachePolicy, RequestCache, RequestCacheConfig, POPULAR_SEARCHES};
pub use retry::RetryPolicy;
