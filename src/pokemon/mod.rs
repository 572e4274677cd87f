//! Pokémon list aggregation and record reshaping

pub mod formatter;
pub mod service;

pub use service::{PokemonService, WarmReport};
