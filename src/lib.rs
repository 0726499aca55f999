//! Quire - incremental static site builder
//!
//! This library provides functionality to:
//! - Discover source files and dispatch each to a content transformer
//! - Track which files every generated output was derived from
//! - Rebuild only the affected entries when a file changes in watch mode

pub mod build;
pub mod cli;
pub mod config;
pub mod graph;
pub mod logger;
pub mod transform;
pub mod watch;
