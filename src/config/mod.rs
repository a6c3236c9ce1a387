//! Configuration module for assetline
//!
//! Provides types and parsing for `assetline.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
