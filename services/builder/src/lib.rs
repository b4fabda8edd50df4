//! Builder - Assembles the local store of Italian administrative geography
//!
//! Pulls five public feeds in parallel, reconciles them on the six-digit
//! municipality code and loads the result into a single SQLite file.

pub mod config;
pub mod error;
pub mod feeds;
pub mod loader;
pub mod manifest;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;

pub use config::Config;
pub use error::{BuildError, FeedError};
pub use feeds::{FeedClient, HttpFeedClient};
pub use loader::BuildSummary;
pub use manifest::{Manifest, StoreStatus};
pub use pipeline::{build_store, ensure_store, preview, refresh, RefreshOutcome};
