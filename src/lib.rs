//! Reddit Media Downloader - download media linked from Reddit posts
//!
//! This library gathers posts from configurable sources, filters them, and
//! downloads every linked media file once.
//!
//! # Features
//!
//! - Saved, upvoted and subreddit sources with typed settings
//! - Per-group filters on post fields
//! - URL deduplication and album grouping
//! - Direct HTTP and yt-dlp backed downloads with cancellation
//! - Identical-file reuse via content hashing
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use reddit_media_downloader::{Config, MemoryStore, RedditApi, SourceGroup};
//! use reddit_media_downloader::config::seed_store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let store = MemoryStore::new();
//!     let groups = seed_store(&config, &store).await?;
//!     let api = Arc::new(RedditApi::authenticate(config.credentials()).await?);
//!
//!     for id in groups {
//!         let group = SourceGroup::load(&store, id).await?;
//!         let summary = group.scan(api.clone(), &store).await?;
//!         println!("{}: {} new posts", group.name(), summary.posts_new);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod filters;
pub mod fs;
pub mod group;
pub mod listing;
pub mod output;
pub mod sources;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use api::{ContentApi, RedditApi};
pub use config::Config;
pub use download::{CancelSignal, DispatchStats, Dispatcher, DownloaderRegistry, UrlState};
pub use error::{Error, Result};
pub use group::{ScanSummary, SourceGroup};
pub use sources::{Source, SourceRegistry};
pub use store::{MemoryStore, Store};
