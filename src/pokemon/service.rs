//! # Pokemon List Service
//!
//! Page/limit/search orchestration over a `PokemonSource`.
//!
//! A page is built in three steps: read an index slice, resolve each entry's
//! detail record, reshape it. Index failures end the call. A failed detail
//! fetch or format only drops that entry, which is recorded in
//! `ListOutcome::skipped`.
//!
//! Search scans a fixed pool from the start of the index
//! (`search_pool_size`, 200 by default), so Pokémon past the pool are never
//! found. Details are resolved only for the requested page of matches.

use super::formatter;
use crate::core::config::AggregatorConfig;
use crate::core::error::PokedexResult;
use crate::core::types::{ListOutcome, ListResult, PaginationInfo, PokemonSummary, SkippedEntry};
use crate::observability::metrics;
use crate::upstream::{IndexEntry, PokemonSource};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Summary of a cache warm-up run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub pages_warmed: u32,
    pub pokemon_cached: usize,
    pub failures: u32,
}

/// Builds paginated, optionally filtered Pokémon lists
pub struct PokemonService {
    source: Arc<dyn PokemonSource>,
    config: AggregatorConfig,
}

impl PokemonService {
    pub fn new(source: Arc<dyn PokemonSource>, config: AggregatorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Build one page. `page >= 1` and `1 <= limit <= 100` are checked by the caller.
    pub async fn list(&self, page: u32, limit: u32, search: Option<&str>) -> PokedexResult<ListOutcome> {
        info!(page, limit, search = ?search, "Fetching Pokemon list");

        let search_term = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let result = match search_term {
            Some(term) => self.search(&term, page, limit).await,
            None => self.paginate(page, limit).await,
        };

        if let Err(e) = &result {
            error!(page, limit, search = ?search, error = %e, "Failed to get Pokemon list");
        }
        result
    }

    async fn paginate(&self, page: u32, limit: u32) -> PokedexResult<ListOutcome> {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
        let index = self.source.fetch_index(limit, offset).await?;

        let pagination = PaginationInfo::new(page, index.count, limit);
        let entries: Vec<IndexEntry> = index.results.into_iter().take(limit as usize).collect();
        let (data, skipped) = self.resolve(entries, limit).await;

        Ok(ListOutcome {
            result: ListResult { data, pagination },
            skipped,
        })
    }

    async fn search(&self, term: &str, page: u32, limit: u32) -> PokedexResult<ListOutcome> {
        info!(search_term = %term, page, limit, "Searching Pokemon");

        let index = self.source.fetch_index(self.config.search_pool_size, 0).await?;
        let matches: Vec<IndexEntry> = index
            .results
            .into_iter()
            .filter(|entry| entry.name.to_lowercase().contains(term))
            .collect();

        let pagination = PaginationInfo::new(page, matches.len() as u64, limit);

        let start = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
        let page_entries: Vec<IndexEntry> = matches
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        let (data, skipped) = self.resolve(page_entries, limit).await;

        Ok(ListOutcome {
            result: ListResult { data, pagination },
            skipped,
        })
    }

    /// Fetch and format details with bounded fan-out, keeping index order
    async fn resolve(
        &self,
        entries: Vec<IndexEntry>,
        limit: u32,
    ) -> (Vec<PokemonSummary>, Vec<SkippedEntry>) {
        let fan_out = self.config.detail_concurrency.min(limit as usize).max(1);

        let outcomes: Vec<_> = stream::iter(entries.into_iter().map(|entry| async move {
            let formatted = match self.source.fetch_detail(&entry.url).await {
                Ok(raw) => formatter::format(&raw),
                Err(e) => Err(e),
            };
            (entry, formatted)
        }))
        .buffered(fan_out)
        .collect()
        .await;

        let mut data = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();

        for (entry, formatted) in outcomes {
            match formatted {
                Ok(summary) => data.push(summary),
                Err(e) => {
                    warn!(
                        pokemon_name = %entry.name,
                        url = %entry.url,
                        error = %e,
                        "Failed to fetch Pokemon details"
                    );
                    skipped.push(SkippedEntry {
                        name: entry.name,
                        url: entry.url,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !skipped.is_empty() {
            metrics::record_skipped_entries(skipped.len());
        }

        (data, skipped)
    }

    /// Pre-load pages `1..=pages` into the cache, pausing between pages
    pub async fn warm_cache(&self, pages: u32, limit: u32) -> WarmReport {
        info!(pages, limit, "Warming Pokemon cache");
        let mut report = WarmReport::default();

        for page in 1..=pages {
            match self.list(page, limit, None).await {
                Ok(outcome) => {
                    let count = outcome.result.data.len();
                    report.pages_warmed += 1;
                    report.pokemon_cached += count;
                    info!(page, limit, pokemon_count = count, "Warmed cache for page");
                }
                Err(e) => {
                    report.failures += 1;
                    error!(page, limit, error = %e, "Cache warming failed for page");
                }
            }

            if page < pages {
                tokio::time::sleep(self.config.warm_page_delay).await;
            }
        }

        info!(
            pages_warmed = report.pages_warmed,
            pokemon_cached = report.pokemon_cached,
            failures = report.failures,
            "Cache warming finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PokedexError;
    use crate::upstream::PokemonIndex;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        names: Vec<String>,
        reported_count: u64,
        failing_details: HashSet<String>,
        index_down: AtomicBool,
        detail_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        detail_delay: Option<Duration>,
        /// Return the whole index whatever `limit` asks for
        ignores_limit: bool,
    }

    impl FakeSource {
        fn with_names(names: &[&str]) -> Self {
            Self {
                names: names.iter().map(|n| n.to_string()).collect(),
                reported_count: names.len() as u64,
                ..Default::default()
            }
        }

        fn url_for(name: &str) -> String {
            format!("https://pokeapi.co/api/v2/pokemon/{}/", name)
        }
    }

    #[async_trait]
    impl PokemonSource for FakeSource {
        async fn fetch_index(&self, limit: u32, offset: u64) -> PokedexResult<PokemonIndex> {
            if self.index_down.load(Ordering::SeqCst) {
                return Err(PokedexError::upstream(Some(503), "index down"));
            }
            let results = self
                .names
                .iter()
                .skip(offset as usize)
                .take(if self.ignores_limit { usize::MAX } else { limit as usize })
                .map(|name| IndexEntry {
                    name: name.clone(),
                    url: Self::url_for(name),
                })
                .collect();
            Ok(PokemonIndex {
                results,
                count: self.reported_count,
            })
        }

        async fn fetch_detail(&self, url: &str) -> PokedexResult<Value> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.detail_delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            if self.failing_details.contains(&name) {
                return Err(PokedexError::upstream(Some(500), "detail down"));
            }
            Ok(json!({
                "name": name,
                "height": 7,
                "weight": 69,
                "types": [{ "type": { "name": "grass" } }]
            }))
        }
    }

    fn build_service(source: FakeSource) -> (PokemonService, Arc<FakeSource>) {
        let source = Arc::new(source);
        let config = AggregatorConfig {
            warm_page_delay: Duration::from_millis(1),
            ..Default::default()
        };
        (PokemonService::new(source.clone(), config), source)
    }

    #[tokio::test]
    async fn test_first_page_of_full_index() {
        let names: Vec<String> = (1..=1292).map(|i| format!("pokemon-{}", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let (service, _) = build_service(FakeSource::with_names(&names));

        let result = service.list(1, 20, None).await.unwrap().into_result();
        assert_eq!(result.data.len(), 20);
        assert_eq!(result.data[0].name, "pokemon-1");
        assert_eq!(result.pagination.total_pages, 65);
        assert_eq!(result.pagination.total_count, 1292);
        assert!(result.pagination.has_next);
    }

    #[tokio::test]
    async fn test_oversized_index_page_is_capped_at_limit() {
        let mut source =
            FakeSource::with_names(&["bulbasaur", "ivysaur", "venusaur", "charmander", "charmeleon"]);
        source.ignores_limit = true;
        let (service, source) = build_service(source);

        let result = service.list(1, 2, None).await.unwrap().into_result();
        let names: Vec<&str> = result.data.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bulbasaur", "ivysaur"]);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.pagination.total_pages, 3);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let (service, _) = build_service(FakeSource::with_names(&["bulbasaur", "ivysaur"]));

        let result = service.list(999, 20, None).await.unwrap().into_result();
        assert!(result.data.is_empty());
        assert_eq!(result.pagination.current_page, 999);
        assert_eq!(result.pagination.total_pages, 1);
        assert!(!result.pagination.has_next);
    }

    #[tokio::test]
    async fn test_search_filters_by_substring_in_index_order() {
        let (service, source) = build_service(FakeSource::with_names(&[
            "charmander",
            "squirtle",
            "charmeleon",
            "charizard",
        ]));

        let result = service.list(1, 20, Some("  CHAR ")).await.unwrap().into_result();
        let names: Vec<_> = result.data.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["charmander", "charmeleon", "charizard"]);
        assert_eq!(result.pagination.total_count, 3);
        assert_eq!(result.pagination.total_pages, 1);
        assert!(!result.pagination.has_next);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_resolves_only_the_requested_page() {
        let (service, source) = build_service(FakeSource::with_names(&[
            "charmander",
            "charmeleon",
            "charizard",
        ]));

        let result = service.list(2, 2, Some("char")).await.unwrap().into_result();
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].name, "charizard");
        assert_eq!(result.pagination.total_pages, 2);
        assert!(!result.pagination.has_next);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_search_is_plain_pagination() {
        let (service, _) = build_service(FakeSource::with_names(&["bulbasaur", "ivysaur"]));

        let result = service.list(1, 1, Some("   ")).await.unwrap().into_result();
        assert_eq!(result.data[0].name, "bulbasaur");
        assert_eq!(result.pagination.total_pages, 2);
    }

    #[tokio::test]
    async fn test_failed_detail_is_skipped() {
        let mut source = FakeSource::with_names(&["bulbasaur", "ivysaur", "venusaur"]);
        source.failing_details.insert("ivysaur".to_string());
        let (service, _) = build_service(source);

        let outcome = service.list(1, 20, None).await.unwrap();
        let names: Vec<_> = outcome.result.data.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bulbasaur", "venusaur"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].name, "ivysaur");
        assert_eq!(outcome.result.pagination.total_count, 3);
    }

    #[tokio::test]
    async fn test_index_failure_is_terminal() {
        let source = FakeSource::with_names(&["bulbasaur"]);
        source.index_down.store(true, Ordering::SeqCst);
        let (service, _) = build_service(source);

        let err = service.list(1, 20, None).await.unwrap_err();
        assert!(matches!(err, PokedexError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_detail_fan_out_is_bounded() {
        let names: Vec<String> = (1..=12).map(|i| format!("pokemon-{}", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut source = FakeSource::with_names(&names);
        source.detail_delay = Some(Duration::from_millis(20));

        let source = Arc::new(source);
        let config = AggregatorConfig {
            detail_concurrency: 3,
            ..Default::default()
        };
        let service = PokemonService::new(source.clone(), config);

        let result = service.list(1, 12, None).await.unwrap().into_result();
        assert_eq!(result.data.len(), 12);
        assert_eq!(result.data[11].name, "pokemon-12");

        let max = source.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "fan-out exceeded: {}", max);
        assert!(max >= 2, "details were not fetched concurrently");
    }

    #[tokio::test]
    async fn test_warm_cache_counts_pages_and_failures() {
        let names: Vec<String> = (1..=45).map(|i| format!("pokemon-{}", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let (service, _) = build_service(FakeSource::with_names(&names));

        let report = service.warm_cache(3, 20).await;
        assert_eq!(
            report,
            WarmReport {
                pages_warmed: 3,
                pokemon_cached: 45,
                failures: 0
            }
        );

        let source = FakeSource::with_names(&["bulbasaur"]);
        source.index_down.store(true, Ordering::SeqCst);
        let (service, _) = build_service(source);
        let report = service.warm_cache(2, 20).await;
        assert_eq!(report.pages_warmed, 0);
        assert_eq!(report.failures, 2);
    }
}
