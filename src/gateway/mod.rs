//! HTTP surface: public API router, validation and the server process

pub mod server;

pub use server::{create_app, PokedexServer};
