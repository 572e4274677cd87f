//! # Metrics
//!
//! Counter names and recording helpers. The gateway records through the
//! `metrics` facade only; installing an exporter is left to the embedding
//! process, and without one every call is a no-op.

use metrics::{counter, describe_counter};

pub const CACHE_HITS: &str = "pokedex_cache_hits_total";
pub const CACHE_MISSES: &str = "pokedex_cache_misses_total";
pub const UPSTREAM_REQUESTS: &str = "pokedex_upstream_requests_total";
pub const SKIPPED_ENTRIES: &str = "pokedex_skipped_entries_total";

/// Register descriptions for every counter
pub fn describe_metrics() {
    describe_counter!(CACHE_HITS, "Read-through cache hits");
    describe_counter!(CACHE_MISSES, "Read-through cache misses");
    describe_counter!(UPSTREAM_REQUESTS, "Requests sent to PokeAPI, by operation and outcome");
    describe_counter!(SKIPPED_ENTRIES, "Index entries dropped during list aggregation");
}

pub fn record_cache_hit() {
    counter!(CACHE_HITS).increment(1);
}

pub fn record_cache_miss() {
    counter!(CACHE_MISSES).increment(1);
}

pub fn record_upstream_request(operation: &'static str, outcome: &'static str) {
    counter!(UPSTREAM_REQUESTS, "operation" => operation, "outcome" => outcome).increment(1);
}

pub fn record_skipped_entries(count: usize) {
    if count > 0 {
        counter!(SKIPPED_ENTRIES).increment(count as u64);
    }
}
