//! Configuration module
//!
//! Provides types, discovery and parsing for `sharedtiles.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
