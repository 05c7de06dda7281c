//! Persistence module.
//!
//! This module provides:
//! - Entity models keyed by id
//! - The `Store` repository contract the pipeline persists through
//! - An in-memory `Store` implementation

pub mod memory;
pub mod models;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryStore;
pub use models::*;

/// Repository-style read/write contract used by the pipeline.
///
/// Implementations must enforce URL address uniqueness themselves;
/// `dedupe_url` is the only way new URL rows are created.
#[async_trait]
pub trait Store: Send + Sync {
    // Posts
    async fn save_post(&self, post: &Post) -> Result<()>;
    async fn has_post(&self, id: &str) -> Result<bool>;
    async fn get_submission(&self, id: &str) -> Result<Option<Submission>>;
    async fn get_comment(&self, id: &str) -> Result<Option<Comment>>;

    // Urls
    /// Find the URL row for `address`, creating it if absent.
    ///
    /// Returns the row and whether it was created by this call.
    async fn dedupe_url(&self, address: &str) -> Result<(UrlRecord, bool)>;
    async fn find_url_by_address(&self, address: &str) -> Result<Option<UrlRecord>>;
    async fn get_url(&self, id: UrlId) -> Result<Option<UrlRecord>>;
    async fn save_url(&self, url: &UrlRecord) -> Result<()>;
    async fn unprocessed_urls(&self) -> Result<Vec<UrlRecord>>;
    async fn failed_urls(&self) -> Result<Vec<UrlRecord>>;
    /// Delete a URL and every download that references it.
    async fn delete_url(&self, id: UrlId) -> Result<()>;

    // Downloads
    /// Insert a download, or return the existing row for the same post and URL.
    async fn save_download(&self, download: DownloadRecord) -> Result<DownloadRecord>;
    async fn downloads_for_post(&self, parent: &PostRef) -> Result<Vec<DownloadRecord>>;
    async fn downloads_for_url(&self, url_id: UrlId) -> Result<Vec<DownloadRecord>>;

    // Files
    async fn insert_file(&self, file: FileRecord) -> Result<FileRecord>;
    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>>;
    async fn find_file_by_hash(&self, hash: &str) -> Result<Option<FileRecord>>;
    /// Delete a file along with the URLs it backs and their downloads.
    async fn delete_file(&self, id: FileId) -> Result<()>;

    // Source groups
    async fn insert_source_group(&self, name: &str, color: &str) -> Result<SourceGroupRecord>;
    async fn get_source_group(&self, id: GroupId) -> Result<Option<SourceGroupRecord>>;
    async fn find_source_group_by_name(&self, name: &str) -> Result<Option<SourceGroupRecord>>;
    async fn source_groups(&self) -> Result<Vec<SourceGroupRecord>>;
    /// Delete a group together with its sources and filters.
    async fn delete_source_group(&self, id: GroupId) -> Result<()>;

    async fn insert_source(&self, source: SourceRecord) -> Result<SourceRecord>;
    /// Sources of a group in stored order.
    async fn sources_for_group(&self, group_id: GroupId) -> Result<Vec<SourceRecord>>;

    async fn insert_filter(&self, filter: FilterRecord) -> Result<FilterRecord>;
    async fn filters_for_group(&self, group_id: GroupId) -> Result<Vec<FilterRecord>>;
}
