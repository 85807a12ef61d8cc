//! Social network clients used by skywire.
//!
//! Only the Bluesky / AT Protocol client exists today. See [`bluesky`] for the
//! session flow, the cursor pager and the stdin-driven bulk helpers.
pub mod bluesky;
