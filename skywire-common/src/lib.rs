//! Shared plumbing for the skywire crates.
//!
//! Two small concerns live here so that every other crate can depend on them
//! without pulling in HTTP or storage stacks:
//!
//! - [`observability`]: one-shot `tracing` initialisation for binaries and tests
//! - [`output`]: JSON record sinks used to stream API results to stdout
//!
//! # Examples
//!
//! Collecting emitted records in memory:
//!
//! ```rust
//! use skywire_common::output::ItemSink;
//! use serde_json::json;
//!
//! let mut sink: Vec<serde_json::Value> = Vec::new();
//! sink.emit(&json!({"handle": "alice.test"})).unwrap();
//! assert_eq!(sink.len(), 1);
//! ```
pub mod observability;
pub mod output;

pub use output::{ItemSink, JsonLines, OutputStyle};
