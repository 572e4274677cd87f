//! # Upstream Module
//!
//! Access to PokeAPI. The aggregation layer only sees the `PokemonSource`
//! trait, so it can run against the real HTTP client or an in-process fake.

pub mod client;

pub use client::PokeApiClient;

use crate::core::error::PokedexResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry of the PokeAPI index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub url: String,
}

/// A slice of the PokeAPI index plus the total number of Pokémon upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonIndex {
    pub results: Vec<IndexEntry>,
    pub count: u64,
}

/// Source of index pages and raw detail records
#[async_trait]
pub trait PokemonSource: Send + Sync {
    /// Fetch `limit` index entries starting at `offset`
    async fn fetch_index(&self, limit: u32, offset: u64) -> PokedexResult<PokemonIndex>;

    /// Fetch the raw detail record behind an index entry's URL
    async fn fetch_detail(&self, url: &str) -> PokedexResult<serde_json::Value>;
}
