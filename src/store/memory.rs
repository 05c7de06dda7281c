//! In-memory `Store` backed by id-keyed tables behind a single async mutex.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::store::models::*;
use crate::store::Store;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    submissions: HashMap<String, Submission>,
    comments: HashMap<String, Comment>,
    urls: BTreeMap<UrlId, UrlRecord>,
    /// Rebuilt from `urls` when a snapshot is loaded.
    #[serde(skip)]
    url_index: HashMap<String, UrlId>,
    files: BTreeMap<FileId, FileRecord>,
    downloads: BTreeMap<DownloadId, DownloadRecord>,
    groups: BTreeMap<GroupId, SourceGroupRecord>,
    sources: BTreeMap<SourceId, SourceRecord>,
    filters: BTreeMap<FilterId, FilterRecord>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn post_exists(&self, parent: &PostRef) -> bool {
        match parent {
            PostRef::Submission(id) => self.submissions.contains_key(id),
            PostRef::Comment(id) => self.comments.contains_key(id),
        }
    }

    fn rebuild_url_index(&mut self) {
        self.url_index = self
            .urls
            .values()
            .map(|url| (url.address.clone(), url.id))
            .collect();
    }

    fn remove_url(&mut self, id: UrlId) {
        if let Some(url) = self.urls.remove(&id) {
            self.url_index.remove(&url.address);
        }
        self.downloads.retain(|_, d| d.url_id != id);
    }
}

/// `Store` implementation holding every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store written by [`MemoryStore::save_snapshot`].
    ///
    /// A missing file gives an empty store.
    pub async fn load_snapshot(path: &Path) -> Result<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No store snapshot at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut tables: Tables = serde_json::from_str(&text).map_err(|e| {
            Error::Storage(format!("Unreadable store snapshot {}: {}", path.display(), e))
        })?;
        tables.rebuild_url_index();
        tracing::debug!(
            "Loaded store snapshot with {} urls and {} files",
            tables.urls.len(),
            tables.files.len()
        );
        Ok(Self {
            tables: Mutex::new(tables),
        })
    }

    /// Write every table to `path`, replacing the previous snapshot whole.
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(&*self.tables.lock().await)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, text).await?;
        tokio::fs::rename(&partial, path).await?;
        Ok(())
    }

    /// Number of URL rows.
    pub async fn url_count(&self) -> usize {
        self.tables.lock().await.urls.len()
    }

    /// Number of download rows.
    pub async fn download_count(&self) -> usize {
        self.tables.lock().await.downloads.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_post(&self, post: &Post) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match post {
            Post::Submission(s) => {
                tables.submissions.insert(s.id.clone(), s.clone());
            }
            Post::Comment(c) => {
                tables.comments.insert(c.id.clone(), c.clone());
            }
        }
        Ok(())
    }

    async fn has_post(&self, id: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.submissions.contains_key(id) || tables.comments.contains_key(id))
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        Ok(self.tables.lock().await.submissions.get(id).cloned())
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        Ok(self.tables.lock().await.comments.get(id).cloned())
    }

    async fn dedupe_url(&self, address: &str) -> Result<(UrlRecord, bool)> {
        let mut tables = self.tables.lock().await;

        if let Some(id) = tables.url_index.get(address).copied() {
            let existing = tables
                .urls
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::Storage(format!("URL index points at missing row {}", id)))?;
            return Ok((existing, false));
        }

        let mut url = UrlRecord::new(address);
        url.id = tables.next_id();
        tables.url_index.insert(url.address.clone(), url.id);
        tables.urls.insert(url.id, url.clone());
        Ok((url, true))
    }

    async fn find_url_by_address(&self, address: &str) -> Result<Option<UrlRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .url_index
            .get(address)
            .and_then(|id| tables.urls.get(id))
            .cloned())
    }

    async fn get_url(&self, id: UrlId) -> Result<Option<UrlRecord>> {
        Ok(self.tables.lock().await.urls.get(&id).cloned())
    }

    async fn save_url(&self, url: &UrlRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;

        let previous = tables
            .urls
            .get(&url.id)
            .map(|u| u.address.clone())
            .ok_or_else(|| Error::Storage(format!("URL {} does not exist", url.id)))?;

        if previous != url.address {
            if tables.url_index.contains_key(&url.address) {
                return Err(Error::Storage(format!(
                    "URL address already exists: {}",
                    url.address
                )));
            }
            tables.url_index.remove(&previous);
            tables.url_index.insert(url.address.clone(), url.id);
        }

        if let Some(file_id) = url.file_id {
            if !tables.files.contains_key(&file_id) {
                return Err(Error::Storage(format!("File {} does not exist", file_id)));
            }
        }

        tables.urls.insert(url.id, url.clone());
        Ok(())
    }

    async fn unprocessed_urls(&self) -> Result<Vec<UrlRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.urls.values().filter(|u| !u.processed).cloned().collect())
    }

    async fn failed_urls(&self) -> Result<Vec<UrlRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.urls.values().filter(|u| u.failed).cloned().collect())
    }

    async fn delete_url(&self, id: UrlId) -> Result<()> {
        self.tables.lock().await.remove_url(id);
        Ok(())
    }

    async fn save_download(&self, mut download: DownloadRecord) -> Result<DownloadRecord> {
        let mut tables = self.tables.lock().await;

        if !tables.post_exists(&download.parent) {
            return Err(Error::Storage(format!(
                "Download references missing post {}",
                download.parent.id()
            )));
        }
        if !tables.urls.contains_key(&download.url_id) {
            return Err(Error::Storage(format!(
                "Download references missing URL {}",
                download.url_id
            )));
        }

        if download.id == 0 {
            if let Some(existing) = tables
                .downloads
                .values()
                .find(|d| d.parent == download.parent && d.url_id == download.url_id)
            {
                return Ok(existing.clone());
            }
            download.id = tables.next_id();
        }

        tables.downloads.insert(download.id, download.clone());
        Ok(download)
    }

    async fn downloads_for_post(&self, parent: &PostRef) -> Result<Vec<DownloadRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .downloads
            .values()
            .filter(|d| &d.parent == parent)
            .cloned()
            .collect())
    }

    async fn downloads_for_url(&self, url_id: UrlId) -> Result<Vec<DownloadRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .downloads
            .values()
            .filter(|d| d.url_id == url_id)
            .cloned()
            .collect())
    }

    async fn insert_file(&self, mut file: FileRecord) -> Result<FileRecord> {
        let mut tables = self.tables.lock().await;
        if tables.files.values().any(|f| f.path == file.path) {
            return Err(Error::Storage(format!(
                "File path already owned by another record: {}",
                file.path
            )));
        }
        file.id = tables.next_id();
        tables.files.insert(file.id, file.clone());
        Ok(file)
    }

    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        Ok(self.tables.lock().await.files.get(&id).cloned())
    }

    async fn find_file_by_hash(&self, hash: &str) -> Result<Option<FileRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.files.values().find(|f| f.hash == hash).cloned())
    }

    async fn delete_file(&self, id: FileId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.files.remove(&id);
        let dependents: Vec<UrlId> = tables
            .urls
            .values()
            .filter(|u| u.file_id == Some(id))
            .map(|u| u.id)
            .collect();
        for url_id in dependents {
            tables.remove_url(url_id);
        }
        Ok(())
    }

    async fn insert_source_group(&self, name: &str, color: &str) -> Result<SourceGroupRecord> {
        let mut tables = self.tables.lock().await;
        let group = SourceGroupRecord {
            id: tables.next_id(),
            name: name.to_string(),
            color: color.to_string(),
        };
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_source_group(&self, id: GroupId) -> Result<Option<SourceGroupRecord>> {
        Ok(self.tables.lock().await.groups.get(&id).cloned())
    }

    async fn find_source_group_by_name(&self, name: &str) -> Result<Option<SourceGroupRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.groups.values().find(|g| g.name == name).cloned())
    }

    async fn source_groups(&self) -> Result<Vec<SourceGroupRecord>> {
        Ok(self.tables.lock().await.groups.values().cloned().collect())
    }

    async fn delete_source_group(&self, id: GroupId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.groups.remove(&id);
        tables.sources.retain(|_, s| s.source_group_id != id);
        tables.filters.retain(|_, f| f.source_group_id != id);
        Ok(())
    }

    async fn insert_source(&self, mut source: SourceRecord) -> Result<SourceRecord> {
        let mut tables = self.tables.lock().await;
        if !tables.groups.contains_key(&source.source_group_id) {
            return Err(Error::Storage(format!(
                "Source '{}' references missing group {}",
                source.name, source.source_group_id
            )));
        }
        source.id = tables.next_id();
        tables.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn sources_for_group(&self, group_id: GroupId) -> Result<Vec<SourceRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sources
            .values()
            .filter(|s| s.source_group_id == group_id)
            .cloned()
            .collect())
    }

    async fn insert_filter(&self, mut filter: FilterRecord) -> Result<FilterRecord> {
        let mut tables = self.tables.lock().await;
        if !tables.groups.contains_key(&filter.source_group_id) {
            return Err(Error::Storage(format!(
                "Filter on '{}' references missing group {}",
                filter.field, filter.source_group_id
            )));
        }
        filter.id = tables.next_id();
        tables.filters.insert(filter.id, filter.clone());
        Ok(filter)
    }

    async fn filters_for_group(&self, group_id: GroupId) -> Result<Vec<FilterRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .filters
            .values()
            .filter(|f| f.source_group_id == group_id)
            .cloned()
            .collect())
    }
}
