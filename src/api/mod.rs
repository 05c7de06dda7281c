//! Remote content API module.
//!
//! This module provides:
//! - The capability contract the pipeline needs (`ContentApi`, `Listing`)
//! - HTTP client for the Reddit OAuth API
//! - OAuth refresh-token authentication
//! - API response types

pub mod auth;
pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use auth::Credentials;
pub use client::{RedditApi, MAX_PAGE_SIZE};
pub use types::*;

/// Cursor-bearing handle over one upstream listing.
#[async_trait]
pub trait Listing: Send {
    /// Fetch the next page, replacing the previous one. Empty once exhausted.
    async fn fetch_more(&mut self, page_size: usize) -> Result<Vec<RawItem>>;
}

/// Capabilities of the remote content API used by sources.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch a single item by fullname.
    async fn fetch_by_id(&self, id: &str) -> Result<RawItem>;

    /// Start a new listing. Each call begins at the first page.
    async fn start_listing(&self, kind: &ListingKind) -> Result<Box<dyn Listing>>;

    /// Complete a partially-loaded item.
    async fn fetch_full(&self, item: &RawItem) -> Result<RawItem> {
        let name = item.name().ok_or_else(|| {
            crate::error::Error::Api("Cannot complete an item without a name".into())
        })?;
        self.fetch_by_id(name).await
    }
}
