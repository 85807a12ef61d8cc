//! Bluesky XRPC integration.
//!
//! - [`client`]: authenticated endpoint operations over the shared HTTP executor
//! - [`pager`]: cursor-following page streams
//! - [`bulk`]: replays operations over identifiers read from stdin
//! - [`aturi`]: AT-URI parsing and list URL resolution helpers
//! - [`types`]: typed request/response models
pub mod aturi;
pub mod bulk;
pub mod client;
pub mod error;
pub mod pager;
pub mod types;

pub use aturi::AtUri;
pub use client::BlueskyApi;
pub use error::{BlueskyError, Result};
pub use pager::{PageStats, PageStream, drain_items, paginate};
pub use types::{PagedResult, Session};
