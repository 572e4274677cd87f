//! # Pokemon Feed
//!
//! Infinite-scroll state on top of the request cache: the current search,
//! the pages loaded so far and whether the end was reached.
//!
//! Every change of search bumps a request token. A load captures the token
//! when it starts and its result is only applied if the token is unchanged,
//! so a slow response for an old search can never overwrite a newer one.

use super::api::ApiError;
use super::fingerprint::ListRequest;
use super::request_cache::RequestCache;
use crate::core::types::{PaginationInfo, PokemonSummary};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Page size used by the feed unless configured otherwise
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// What a load did to the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    /// The page was applied
    Applied {
        page: u32,
        added: usize,
        reached_end: bool,
    },
    /// The search changed while loading; the result was dropped
    Superseded,
    /// Nothing to load: the end was reached or a load is already running
    Idle,
    /// The load failed; the error is kept in the feed state
    Failed(ApiError),
}

/// Read-only copy of the feed state
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub search: Option<String>,
    pub page: u32,
    pub pokemon: Vec<PokemonSummary>,
    pub pagination: Option<PaginationInfo>,
    pub reached_end: bool,
    pub loading: bool,
    pub error: Option<ApiError>,
}

#[derive(Debug, Default)]
struct FeedState {
    search: Option<String>,
    /// Last page applied, 0 before the first load
    page: u32,
    pokemon: Vec<PokemonSummary>,
    pagination: Option<PaginationInfo>,
    reached_end: bool,
    loading: bool,
    error: Option<ApiError>,
    token: u64,
}

impl FeedState {
    fn request(&self, page: u32, limit: u32) -> ListRequest {
        let request = ListRequest::new(page, limit);
        match &self.search {
            Some(search) => request.with_search(search),
            None => request,
        }
    }
}

/// Accumulating list view over the request cache
pub struct PokemonFeed {
    cache: RequestCache,
    limit: u32,
    state: Mutex<FeedState>,
}

impl PokemonFeed {
    pub fn new(cache: RequestCache) -> Self {
        Self::with_page_size(cache, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(cache: RequestCache, limit: u32) -> Self {
        Self {
            cache,
            limit: limit.max(1),
            state: Mutex::new(FeedState::default()),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock();
        FeedSnapshot {
            search: state.search.clone(),
            page: state.page,
            pokemon: state.pokemon.clone(),
            pagination: state.pagination,
            reached_end: state.reached_end,
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Switch to a new search (blank means none) and start over from page 1
    ///
    /// Returns `false` when the trimmed search is unchanged.
    pub fn set_search(&self, search: &str) -> bool {
        let trimmed = search.trim();
        let search = (!trimmed.is_empty()).then(|| trimmed.to_string());

        let mut state = self.state.lock();
        if state.search == search {
            return false;
        }

        state.token += 1;
        state.search = search;
        let keep_previous = self
            .cache
            .policy_for(&state.request(1, self.limit))
            .keep_previous_data;

        state.page = 0;
        state.reached_end = false;
        state.loading = false;
        state.error = None;
        // Pagination belongs to the old search even when its items stay visible
        state.pagination = None;
        if !keep_previous {
            state.pokemon.clear();
        }

        debug!(search = ?state.search, token = state.token, "Feed search changed");
        true
    }

    /// Load page 1 of the current search, replacing what is shown
    pub async fn load_current(&self) -> FeedUpdate {
        let (token, request) = {
            let mut state = self.state.lock();
            state.loading = true;
            (state.token, state.request(1, self.limit))
        };

        self.load(token, request).await
    }

    /// Load the page after the last applied one
    pub async fn load_more(&self) -> FeedUpdate {
        let (token, request) = {
            let mut state = self.state.lock();
            let can_continue = state.pagination.map_or(true, |p| p.has_next);
            if state.loading || state.reached_end || !can_continue {
                return FeedUpdate::Idle;
            }
            state.loading = true;
            (state.token, state.request(state.page + 1, self.limit))
        };

        self.load(token, request).await
    }

    async fn load(&self, token: u64, request: ListRequest) -> FeedUpdate {
        let page = request.page_or_first();
        let result = self.cache.get(&request).await;

        let mut state = self.state.lock();
        if state.token != token {
            debug!(page, token, current = state.token, "Dropping result for superseded search");
            return FeedUpdate::Superseded;
        }
        state.loading = false;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                warn!(page, error = %error, "Feed failed to load page");
                state.error = Some(error.clone());
                return FeedUpdate::Failed(error);
            }
        };

        let added = if page == 1 {
            state.pokemon = response.data.clone();
            state.pokemon.len()
        } else {
            let existing: HashSet<String> = state.pokemon.iter().map(|p| p.name.clone()).collect();
            let fresh: Vec<PokemonSummary> = response
                .data
                .iter()
                .filter(|p| !existing.contains(&p.name))
                .cloned()
                .collect();
            let added = fresh.len();
            state.pokemon.extend(fresh);
            added
        };

        state.page = page;
        state.pagination = Some(response.pagination);
        state.error = None;
        if !response.pagination.has_next {
            state.reached_end = true;
        }

        FeedUpdate::Applied {
            page,
            added,
            reached_end: state.reached_end,
        }
    }
}
