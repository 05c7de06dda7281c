//! Per-URL download state machine.
//!
//! A URL moves `Unprocessed -> Processing -> Completed | Failed`. Only the
//! dispatcher performs these transitions; failed URLs go back to
//! `Unprocessed` through [`Dispatcher::retry_failed`] and nothing else.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::dedup::{hash_file, mime_type, MediaKind};
use crate::download::progress::{CancelSignal, ProgressSink};
use crate::download::registry::DownloaderRegistry;
use crate::download::state::DispatchStats;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fs::download_target;
use crate::store::{FileId, FileRecord, Post, PostRef, Store, UrlId, UrlRecord};

/// Lifecycle state of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    Unprocessed,
    /// A dispatch is running for this URL in this process.
    Processing,
    Completed,
    Failed,
    /// Returned by a dispatch that found the URL already terminal.
    AlreadyProcessed,
}

impl UrlState {
    /// State recorded on a stored row.
    pub fn of(url: &UrlRecord) -> Self {
        match (url.processed, url.failed) {
            (true, true) => UrlState::Failed,
            (true, false) => UrlState::Completed,
            (false, _) => UrlState::Unprocessed,
        }
    }
}

/// Result of one dispatch with the details run statistics need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub state: UrlState,
    /// The failure was a requested stop.
    pub stopped: bool,
    /// Completed by linking an identical existing file.
    pub reused: bool,
}

impl DispatchOutcome {
    fn of(state: UrlState) -> Self {
        Self {
            state,
            stopped: false,
            reused: false,
        }
    }
}

/// Drives URLs through their lifecycle using the registered backends.
pub struct Dispatcher {
    store: Arc<dyn Store>,
    registry: DownloaderRegistry,
    base_dir: PathBuf,
    hash_files: bool,
    in_flight: Mutex<HashSet<UrlId>>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, registry: DownloaderRegistry, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            registry,
            base_dir: base_dir.into(),
            hash_files: true,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Skip content hashing. Every finished download then gets its own file row.
    pub fn with_hashing(mut self, enabled: bool) -> Self {
        self.hash_files = enabled;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Current state of a stored URL, including in-flight dispatches.
    pub async fn state_of(&self, url_id: UrlId) -> Result<UrlState> {
        if self.is_in_flight(url_id) {
            return Ok(UrlState::Processing);
        }
        let url = self.load_url(url_id).await?;
        Ok(UrlState::of(&url))
    }

    /// Download one URL and record the outcome on its row.
    ///
    /// Backend failures and stops are recorded as `Failed`; only storage
    /// errors are returned as `Err`.
    pub async fn dispatch(
        &self,
        url_id: UrlId,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<UrlState> {
        Ok(self.dispatch_outcome(url_id, progress, cancel).await?.state)
    }

    pub async fn dispatch_outcome(
        &self,
        url_id: UrlId,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<DispatchOutcome> {
        let mut url = self.load_url(url_id).await?;
        if url.processed {
            tracing::debug!("Url {} already processed, skipping", url.address);
            return Ok(DispatchOutcome::of(UrlState::AlreadyProcessed));
        }
        if !self.begin(url_id) {
            return Ok(DispatchOutcome::of(UrlState::Processing));
        }

        let result = self.process(&mut url, progress, cancel).await;
        self.end(url_id);
        progress.finish();
        result
    }

    async fn process(
        &self,
        url: &mut UrlRecord,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<DispatchOutcome> {
        let Some(handler) = self.registry.handler_for(&url.address) else {
            tracing::warn!("No handler for {}", url.address);
            url.set_failed("No handler available", None);
            self.store.save_url(url).await?;
            return Ok(DispatchOutcome::of(UrlState::Failed));
        };

        tracing::debug!("Downloading {} with {}", url.address, handler.name());
        match self.download(url, handler.as_ref(), progress, cancel).await {
            Ok((file_id, reused)) => {
                url.set_completed(file_id, handler.name());
                self.store.save_url(url).await?;
                Ok(DispatchOutcome {
                    state: UrlState::Completed,
                    stopped: false,
                    reused,
                })
            }
            Err(e @ Error::Storage(_)) => Err(e),
            Err(e) => {
                let stopped = e.is_graceful_stop();
                if stopped {
                    tracing::info!("Stopped {}", url.address);
                } else {
                    tracing::warn!("Failed {}: {}", url.address, e);
                }
                url.set_failed(e.to_string(), Some(handler.name()));
                self.store.save_url(url).await?;
                Ok(DispatchOutcome {
                    state: UrlState::Failed,
                    stopped,
                    reused: false,
                })
            }
        }
    }

    async fn download(
        &self,
        url: &UrlRecord,
        handler: &dyn Downloader,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<(FileId, bool)> {
        let downloads = self.store.downloads_for_url(url.id).await?;
        let download = downloads
            .first()
            .ok_or_else(|| Error::Download(format!("No download references {}", url.address)))?;
        let post = self.load_post(&download.parent).await?;

        let destination = download_target(&self.base_dir, &post, download);
        let path = handler.fetch(&url.address, &destination, progress, cancel).await?;
        self.register_file(&path).await
    }

    /// Record a finished file, reusing a stored file with identical content.
    async fn register_file(&self, path: &Path) -> Result<(FileId, bool)> {
        let size = tokio::fs::metadata(path).await?.len();
        let hash = if self.hash_files {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || hash_file(&owned, MediaKind::from_path(&owned)))
                .await
                .map_err(|e| Error::Media(format!("Hashing task failed: {}", e)))??
        } else {
            String::new()
        };

        if !hash.is_empty() {
            if let Some(existing) = self.store.find_file_by_hash(&hash).await? {
                let existing_path = Path::new(&existing.path);
                if existing_path != path && existing_path.exists() {
                    tracing::info!("{} duplicates {}, reusing", path.display(), existing.path);
                    tokio::fs::remove_file(path).await?;
                    return Ok((existing.id, true));
                }
            }
        }

        let file = self
            .store
            .insert_file(FileRecord {
                id: 0,
                path: path.to_string_lossy().to_string(),
                hash,
                size,
                mime_type: mime_type(path),
            })
            .await?;
        Ok((file.id, false))
    }

    /// Dispatch every unprocessed URL in stored order.
    ///
    /// Album members are independent URLs and are dispatched one by one.
    /// Once `cancel` is stopped no further URL starts; those left keep their
    /// `Unprocessed` state.
    pub async fn run_pending<F, P>(&self, mut progress_for: F, cancel: &CancelSignal) -> Result<DispatchStats>
    where
        F: FnMut(&UrlRecord) -> P,
        P: ProgressSink,
    {
        let pending = self.store.unprocessed_urls().await?;
        tracing::info!("{} urls pending download", pending.len());

        let mut stats = DispatchStats::default();
        for (index, url) in pending.iter().enumerate() {
            if cancel.should_stop() {
                stats.remaining = (pending.len() - index) as u64;
                tracing::info!("Stop requested, {} urls left unprocessed", stats.remaining);
                break;
            }

            let progress = progress_for(url);
            let outcome = self.dispatch_outcome(url.id, &progress, &cancel.child()).await?;
            stats.record(outcome.state);
            if outcome.stopped {
                stats.mark_stopped();
            }
            if outcome.reused {
                stats.mark_reused();
            }
        }
        Ok(stats)
    }

    /// Put a failed URL back to `Unprocessed`. Returns whether it was failed.
    pub async fn retry_failed(&self, url_id: UrlId) -> Result<bool> {
        let mut url = self.load_url(url_id).await?;
        if UrlState::of(&url) != UrlState::Failed {
            return Ok(false);
        }
        url.reset();
        self.store.save_url(&url).await?;
        Ok(true)
    }

    /// Reset every failed URL. Returns how many were reset.
    pub async fn retry_all_failed(&self) -> Result<usize> {
        let failed = self.store.failed_urls().await?;
        for url in &failed {
            self.retry_failed(url.id).await?;
        }
        Ok(failed.len())
    }

    async fn load_url(&self, url_id: UrlId) -> Result<UrlRecord> {
        self.store
            .get_url(url_id)
            .await?
            .ok_or_else(|| Error::Storage(format!("Url {} not found", url_id)))
    }

    async fn load_post(&self, parent: &PostRef) -> Result<Post> {
        let post = match parent {
            PostRef::Submission(id) => self.store.get_submission(id).await?.map(Post::Submission),
            PostRef::Comment(id) => self.store.get_comment(id).await?.map(Post::Comment),
        };
        post.ok_or_else(|| Error::Storage(format!("Post {} not found", parent.id())))
    }

    fn begin(&self, url_id: UrlId) -> bool {
        self.in_flight
            .lock()
            .map(|mut set| set.insert(url_id))
            .unwrap_or(false)
    }

    fn end(&self, url_id: UrlId) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&url_id);
        }
    }

    fn is_in_flight(&self, url_id: UrlId) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&url_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::download::progress::NoProgress;
    use crate::fs::{ensure_dir, with_appended_extension};
    use crate::store::{DownloadRecord, MemoryStore};
    use crate::test_support::submission;

    enum Behaviour {
        Write(&'static [u8]),
        /// An MP4 with a 64-bit sized `mdat` whose payload is the address.
        LargeMp4,
        Fail,
        WaitForStop,
    }

    struct StubDownloader {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl StubDownloader {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Downloader for StubDownloader {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn matches(&self, address: &str) -> bool {
            address.starts_with("https://media.example/")
        }

        async fn fetch(
            &self,
            address: &str,
            destination: &Path,
            _progress: &dyn ProgressSink,
            cancel: &CancelSignal,
        ) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Write(bytes) => {
                    ensure_dir(destination.parent().unwrap()).await?;
                    let path = with_appended_extension(destination, "bin");
                    tokio::fs::write(&path, bytes).await?;
                    Ok(path)
                }
                Behaviour::LargeMp4 => {
                    ensure_dir(destination.parent().unwrap()).await?;
                    let mut bytes = vec![0, 0, 0, 12];
                    bytes.extend_from_slice(b"ftypisom");
                    bytes.extend_from_slice(&1u32.to_be_bytes());
                    bytes.extend_from_slice(b"mdat");
                    bytes.extend_from_slice(&((address.len() + 16) as u64).to_be_bytes());
                    bytes.extend_from_slice(address.as_bytes());
                    let path = with_appended_extension(destination, "mp4");
                    tokio::fs::write(&path, bytes).await?;
                    Ok(path)
                }
                Behaviour::Fail => Err(Error::Download("HTTP 500".into())),
                Behaviour::WaitForStop => {
                    cancel.stopped().await;
                    Err(Error::GracefulStop("YTDL terminated child".into()))
                }
            }
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        dispatcher: Dispatcher,
        _dir: tempfile::TempDir,
    }

    fn fixture(stub: Arc<StubDownloader>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let mut registry = DownloaderRegistry::empty();
        registry.push(stub);
        let dispatcher = Dispatcher::new(store.clone(), registry, dir.path());
        Fixture {
            store,
            dispatcher,
            _dir: dir,
        }
    }

    async fn add_url(store: &MemoryStore, post_id: &str, title: &str, address: &str) -> UrlId {
        let mut post = submission(post_id);
        post.title = title.to_string();
        store.save_post(&Post::Submission(post)).await.unwrap();
        let (url, _) = store.dedupe_url(address).await.unwrap();
        store
            .save_download(DownloadRecord::new(PostRef::Submission(post_id.into()), url.id))
            .await
            .unwrap();
        url.id
    }

    #[tokio::test]
    async fn test_successful_dispatch_records_file() {
        let f = fixture(StubDownloader::new(Behaviour::Write(b"media")));
        let id = add_url(&f.store, "t3_a", "Sunset", "https://media.example/a").await;

        let state = f.dispatcher.dispatch(id, &NoProgress, &CancelSignal::new()).await.unwrap();
        assert_eq!(state, UrlState::Completed);

        let url = f.store.get_url(id).await.unwrap().unwrap();
        assert_eq!(UrlState::of(&url), UrlState::Completed);
        assert_eq!(url.handler, "stub");
        let file = f.store.get_file(url.file_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(
            PathBuf::from(&file.path),
            f.dispatcher.base_dir().join("test_sub").join("Sunset.bin")
        );
        assert_eq!(file.size, 5);
        assert!(file.hash.starts_with("md5:"));
    }

    #[tokio::test]
    async fn test_completed_url_is_not_dispatched_again() {
        let stub = StubDownloader::new(Behaviour::Write(b"media"));
        let f = fixture(stub.clone());
        let id = add_url(&f.store, "t3_a", "Sunset", "https://media.example/a").await;

        let cancel = CancelSignal::new();
        f.dispatcher.dispatch(id, &NoProgress, &cancel).await.unwrap();
        let before = f.store.get_url(id).await.unwrap().unwrap();

        let state = f.dispatcher.dispatch(id, &NoProgress, &cancel).await.unwrap();
        assert_eq!(state, UrlState::AlreadyProcessed);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.get_url(id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_no_handler_fails_url() {
        let f = fixture(StubDownloader::new(Behaviour::Write(b"media")));
        let id = add_url(&f.store, "t3_a", "Article", "https://blog.example/post").await;

        let state = f.dispatcher.dispatch(id, &NoProgress, &CancelSignal::new()).await.unwrap();
        assert_eq!(state, UrlState::Failed);

        let url = f.store.get_url(id).await.unwrap().unwrap();
        assert_eq!(url.failure_reason.as_deref(), Some("No handler available"));
        assert_eq!(url.handler, "none");
        assert_eq!(url.completed_utc, 0);
    }

    #[tokio::test]
    async fn test_backend_error_fails_url() {
        let f = fixture(StubDownloader::new(Behaviour::Fail));
        let id = add_url(&f.store, "t3_a", "Sunset", "https://media.example/a").await;

        let state = f.dispatcher.dispatch(id, &NoProgress, &CancelSignal::new()).await.unwrap();
        assert_eq!(state, UrlState::Failed);
        let url = f.store.get_url(id).await.unwrap().unwrap();
        assert!(url.failure_reason.unwrap().contains("HTTP 500"));
        assert_eq!(url.handler, "stub");
    }

    #[tokio::test]
    async fn test_cancellation_fails_with_stop_reason() {
        let f = fixture(StubDownloader::new(Behaviour::WaitForStop));
        let id = add_url(&f.store, "t3_a", "Clip", "https://media.example/clip").await;

        let cancel = CancelSignal::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            stopper.stop();
        });

        let outcome = f
            .dispatcher
            .dispatch_outcome(id, &NoProgress, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.state, UrlState::Failed);
        assert!(outcome.stopped);

        let url = f.store.get_url(id).await.unwrap().unwrap();
        assert!(url.failed);
        assert!(url.failure_reason.unwrap().starts_with("Stopped"));
        assert_eq!(f.dispatcher.state_of(id).await.unwrap(), UrlState::Failed);
    }

    #[tokio::test]
    async fn test_identical_content_reuses_file() {
        let f = fixture(StubDownloader::new(Behaviour::Write(b"same bytes")));
        let first = add_url(&f.store, "t3_a", "First", "https://media.example/a").await;
        let second = add_url(&f.store, "t3_b", "Second", "https://media.example/b").await;

        let stats = f
            .dispatcher
            .run_pending(|_| NoProgress, &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.reused, 1);

        let a = f.store.get_url(first).await.unwrap().unwrap();
        let b = f.store.get_url(second).await.unwrap().unwrap();
        assert_eq!(a.file_id, b.file_id);
        assert!(f.dispatcher.base_dir().join("test_sub/First.bin").exists());
        assert!(!f.dispatcher.base_dir().join("test_sub/Second.bin").exists());
    }

    #[tokio::test]
    async fn test_different_videos_are_kept_apart() {
        let f = fixture(StubDownloader::new(Behaviour::LargeMp4));
        let first = add_url(&f.store, "t3_a", "First", "https://media.example/a").await;
        let second = add_url(&f.store, "t3_b", "Second", "https://media.example/b").await;

        let stats = f
            .dispatcher
            .run_pending(|_| NoProgress, &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.reused, 0);

        let a = f.store.get_url(first).await.unwrap().unwrap();
        let b = f.store.get_url(second).await.unwrap().unwrap();
        assert_ne!(a.file_id, b.file_id);
        assert!(f.dispatcher.base_dir().join("test_sub/First.mp4").exists());
        assert!(f.dispatcher.base_dir().join("test_sub/Second.mp4").exists());
    }

    #[tokio::test]
    async fn test_run_pending_stops_before_remaining_urls() {
        let stub = StubDownloader::new(Behaviour::Write(b"media"));
        let f = fixture(stub.clone());
        let a = add_url(&f.store, "t3_a", "One", "https://media.example/a").await;
        let b = add_url(&f.store, "t3_b", "Two", "https://media.example/b").await;

        let cancel = CancelSignal::new();
        cancel.stop();
        let stats = f.dispatcher.run_pending(|_| NoProgress, &cancel).await.unwrap();

        assert_eq!(stats.remaining, 2);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        for id in [a, b] {
            assert_eq!(f.dispatcher.state_of(id).await.unwrap(), UrlState::Unprocessed);
        }
    }

    #[tokio::test]
    async fn test_retry_failed_resets_url() {
        let f = fixture(StubDownloader::new(Behaviour::Fail));
        let id = add_url(&f.store, "t3_a", "Sunset", "https://media.example/a").await;
        f.dispatcher.dispatch(id, &NoProgress, &CancelSignal::new()).await.unwrap();

        assert!(f.dispatcher.retry_failed(id).await.unwrap());
        assert_eq!(f.dispatcher.state_of(id).await.unwrap(), UrlState::Unprocessed);
        assert!(!f.dispatcher.retry_failed(id).await.unwrap());
    }
}
