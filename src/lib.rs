//! # Pokedex Gateway
//!
//! A small Pokémon backend in front of PokeAPI plus the client library that
//! consumes it.
//!
//! The server side exposes `GET /api/pokemons` (paginated, optionally filtered
//! by name) and `GET /api/health`. Upstream payloads are cached by a
//! read-through cache with a memory or Redis store. An admin listener serves
//! cache stats, clear and warm operations.
//!
//! The client side wraps the list endpoint in a request cache with
//! deduplication, retry, prefetch and an infinite-scroll feed.

/// Error types, configuration and shared data structures
pub mod core;

/// Server-side cache: stores, manager, key generation and admin routes
pub mod caching;

/// PokeAPI HTTP client
pub mod upstream;

/// Listing, search and response formatting
pub mod pokemon;

/// HTTP server, handlers and middleware
pub mod gateway;

/// Logging and metrics
pub mod observability;

/// Client library for the list endpoint
pub mod client;

pub use crate::core::config::PokedexConfig;
pub use crate::core::error::{PokedexError, PokedexResult};
pub use crate::core::types::{ListResponse, PaginationInfo, PokemonSummary};
pub use caching::{CacheConfig, CacheManager};
pub use gateway::{create_app, PokedexServer};
pub use pokemon::PokemonService;
pub use upstream::client::PokeApiClient;
