//! Source groups.
//!
//! Provides:
//! - `SourceGroup`, a named bundle of sources sharing one filter set
//! - `PostGenerator`, which merges every source into a stream of posts,
//!   deduplicated URLs, and downloads
//! - `scan`, which drains a generator into the store

pub mod urls;

use std::collections::VecDeque;
use std::sync::Arc;

use uuid::Uuid;

use crate::api::ContentApi;
use crate::error::{Error, Result};
use crate::filters::FilterSet;
use crate::listing::{resolve_post, ListingReader};
use crate::sources::{Source, SourceRegistry};
use crate::store::{DownloadRecord, GroupId, Post, SourceGroupRecord, Store, UrlRecord};

pub use urls::extract_urls;

/// Entity produced by a [`PostGenerator`], in dependency order.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Post(Post),
    /// A URL row created for the first time during this scan.
    Url(UrlRecord),
    Download(DownloadRecord),
}

/// A source that could not be built from its stored config.
#[derive(Debug)]
pub struct SourceLoadError {
    pub source_name: String,
    pub source_type: String,
    pub error: Error,
}

/// Loaded, runnable source group.
pub struct SourceGroup {
    record: SourceGroupRecord,
    sources: Vec<Box<dyn Source>>,
    filters: FilterSet,
    load_errors: Vec<SourceLoadError>,
}

impl SourceGroup {
    /// Load a group with the built-in source registry.
    pub async fn load(store: &dyn Store, group_id: GroupId) -> Result<Self> {
        Self::load_with(store, group_id, &SourceRegistry::builtin()).await
    }

    /// Load a group's sources and filters.
    ///
    /// A source with broken config is recorded in `load_errors` and skipped.
    /// A broken filter fails the whole load.
    pub async fn load_with(
        store: &dyn Store,
        group_id: GroupId,
        registry: &SourceRegistry,
    ) -> Result<Self> {
        let record = store
            .get_source_group(group_id)
            .await?
            .ok_or_else(|| Error::Storage(format!("Source group {} does not exist", group_id)))?;

        let filters = FilterSet::compile(&store.filters_for_group(group_id).await?)?;

        let mut sources = Vec::new();
        let mut load_errors = Vec::new();
        for source in store.sources_for_group(group_id).await? {
            match registry.create_from_db(&source) {
                Ok(built) => sources.push(built),
                Err(error) => {
                    tracing::warn!(
                        "Skipping source '{}' ({}) in group '{}': {}",
                        source.name,
                        source.source_type,
                        record.name,
                        error
                    );
                    load_errors.push(SourceLoadError {
                        source_name: source.name,
                        source_type: source.source_type,
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            "Loaded group '{}': {} sources, {} filters, {} broken",
            record.name,
            sources.len(),
            filters.len(),
            load_errors.len()
        );

        Ok(Self {
            record,
            sources,
            filters,
            load_errors,
        })
    }

    pub fn record(&self) -> &SourceGroupRecord {
        &self.record
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn sources(&self) -> &[Box<dyn Source>] {
        &self.sources
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn load_errors(&self) -> &[SourceLoadError] {
        &self.load_errors
    }

    /// Start a fresh pass over every source. Generators do not resume.
    pub fn post_generator<'a>(
        &'a self,
        api: Arc<dyn ContentApi>,
        store: &'a dyn Store,
    ) -> PostGenerator<'a> {
        PostGenerator {
            group: self,
            api,
            store,
            next_source: 0,
            reader: None,
            pending: VecDeque::new(),
            summary: ScanSummary::default(),
        }
    }

    /// Drain a new generator, persisting everything it yields.
    pub async fn scan(&self, api: Arc<dyn ContentApi>, store: &dyn Store) -> Result<ScanSummary> {
        tracing::info!("Scanning group '{}'", self.name());
        let mut generator = self.post_generator(api, store);
        while let Some(item) = generator.next().await? {
            match item {
                GroupItem::Post(post) => store.save_post(&post).await?,
                GroupItem::Url(url) => store.save_url(&url).await?,
                GroupItem::Download(download) => {
                    store.save_download(download).await?;
                }
            }
        }
        let mut summary = generator.into_summary();
        summary.sources_skipped += self.load_errors.len();
        Ok(summary)
    }
}

/// Counters collected while scanning a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Posts returned by sources, before filtering.
    pub posts_seen: usize,
    pub posts_filtered: usize,
    /// Posts already stored by an earlier scan.
    pub posts_existing: usize,
    pub posts_new: usize,
    pub urls_new: usize,
    pub downloads: usize,
    /// Sources that failed to load or errored mid-listing.
    pub sources_skipped: usize,
}

/// Pull-based merge of a group's sources.
///
/// Each `next` call yields one entity. For every admitted post the order is:
/// any metadata-only parent submission, the post, then each URL created for
/// it followed by its download.
pub struct PostGenerator<'a> {
    group: &'a SourceGroup,
    api: Arc<dyn ContentApi>,
    store: &'a dyn Store,
    next_source: usize,
    reader: Option<ListingReader>,
    pending: VecDeque<GroupItem>,
    summary: ScanSummary,
}

impl<'a> PostGenerator<'a> {
    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    pub fn into_summary(self) -> ScanSummary {
        self.summary
    }

    pub async fn next(&mut self) -> Result<Option<GroupItem>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }

            if self.reader.is_none() && !self.open_next_source().await? {
                return Ok(None);
            }

            let Some(reader) = self.reader.as_mut() else {
                continue;
            };

            match reader.next().await {
                Ok(Some(post)) => self.process(post).await?,
                Ok(None) => self.reader = None,
                Err(e) if e.is_fatal_to_scan() => return Err(e),
                Err(e) => {
                    tracing::warn!("Source listing failed, moving on: {}", e);
                    self.summary.sources_skipped += 1;
                    self.reader = None;
                }
            }
        }
    }

    /// Open the next source's listing. Returns false once every source is used.
    async fn open_next_source(&mut self) -> Result<bool> {
        while let Some(source) = self.group.sources.get(self.next_source) {
            self.next_source += 1;
            match source.find(self.api.clone()).await {
                Ok(reader) => {
                    tracing::debug!("Reading source '{}' ({})", source.name(), source.source_type());
                    self.reader = Some(reader);
                    return Ok(true);
                }
                Err(e) if e.is_fatal_to_scan() => return Err(e),
                Err(e) => {
                    tracing::warn!("Could not start source '{}': {}", source.name(), e);
                    self.summary.sources_skipped += 1;
                }
            }
        }
        Ok(false)
    }

    async fn already_processed(&self, post: &Post) -> Result<bool> {
        Ok(match post {
            Post::Submission(s) => self
                .store
                .get_submission(&s.id)
                .await?
                .is_some_and(|existing| existing.should_process),
            Post::Comment(c) => self.store.get_comment(&c.id).await?.is_some(),
        })
    }

    async fn process(&mut self, mut post: Post) -> Result<()> {
        self.summary.posts_seen += 1;

        if !self.group.filters.admits(&post) {
            tracing::debug!("Filtered out {}", post.id());
            self.summary.posts_filtered += 1;
            return Ok(());
        }

        if self.already_processed(&post).await? {
            tracing::debug!("Already stored {}", post.id());
            self.summary.posts_existing += 1;
            return Ok(());
        }

        if let Post::Comment(comment) = &post {
            self.queue_missing_parent(&comment.parent_submission_id).await?;
        }

        let addresses = extract_urls(&post);
        match &mut post {
            Post::Submission(s) => s.processed = true,
            Post::Comment(c) => c.processed = true,
        }
        let parent = post.post_ref();
        self.summary.posts_new += 1;
        self.pending.push_back(GroupItem::Post(post));

        let album = (addresses.len() > 1).then(|| Album::new(addresses.len()));
        for (index, address) in addresses.iter().enumerate() {
            let (url, created) = self.store.dedupe_url(address).await?;
            let mut download = DownloadRecord::new(parent.clone(), url.id);
            if let Some(album) = &album {
                album.assign(&mut download, index);
            }
            if created {
                self.summary.urls_new += 1;
                self.pending.push_back(GroupItem::Url(url));
            }
            self.summary.downloads += 1;
            self.pending.push_back(GroupItem::Download(download));
        }

        Ok(())
    }

    /// Store a comment's parent as metadata when it is not known yet.
    async fn queue_missing_parent(&mut self, parent_id: &str) -> Result<()> {
        if self.store.has_post(parent_id).await? {
            return Ok(());
        }

        let resolved = match self.api.fetch_by_id(parent_id).await {
            Ok(raw) => resolve_post(self.api.as_ref(), raw).await,
            Err(e) => Err(e),
        };

        match resolved {
            Ok(Post::Submission(mut parent)) => {
                parent.should_process = false;
                self.pending.push_back(GroupItem::Post(Post::Submission(parent)));
            }
            Ok(Post::Comment(_)) => {
                tracing::warn!("Parent {} resolved to a comment, ignoring", parent_id);
            }
            Err(e) if e.is_fatal_to_scan() => return Err(e),
            Err(e) => tracing::warn!("Could not load parent submission {}: {}", parent_id, e),
        }
        Ok(())
    }
}

/// Shared album metadata for a multi-file post.
struct Album {
    id: String,
    width: usize,
}

impl Album {
    fn new(count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            width: count.to_string().len().max(3),
        }
    }

    /// Members are numbered from 1. The first is the album parent.
    fn assign(&self, download: &mut DownloadRecord, index: usize) {
        download.album_id = Some(self.id.clone());
        download.is_album_parent = index == 0;
        download.album_padded_index = Some(format!("{:0width$}", index + 1, width = self.width));
    }
}
