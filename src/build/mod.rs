//! Build pipeline module for quire
//!
//! Provides the build pass that turns a source tree into a site.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Walk the source tree and apply the ignore list
//! - **Transform**: Dispatch each file to its transformer in parallel
//! - **Output**: Copy unclaimed files, check collisions, write results
//!
//! # Example
//!
//! ```ignore
//! use quire::build::{BuildContext, BuildPipeline};
//! use quire::config::load_project;
//!
//! let loaded = load_project(None, &std::env::current_dir()?)?;
//! let context = BuildContext::new(loaded.config, loaded.project_root);
//! let pipeline = BuildPipeline::new(context);
//!
//! let report = pipeline.run_pass(None)?;
//! println!("{}", report.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod pipeline;
pub mod progress;
pub mod result;

pub use context::*;
pub use discovery::*;
pub use pipeline::*;
pub use result::*;
