//! Configuration module for the quire build system
//!
//! Provides types and parsing for `quire.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
