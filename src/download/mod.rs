//! Download module.
//!
//! This module provides:
//! - The `Downloader` backend contract
//! - Direct HTTP and ytdl backends
//! - Backend selection by address
//! - The per-URL dispatch state machine
//! - Progress reporting and cancellation

pub mod direct;
pub mod dispatcher;
pub mod progress;
pub mod registry;
pub mod state;
pub mod ytdl;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

pub use direct::DirectDownloader;
pub use dispatcher::{Dispatcher, UrlState};
pub use progress::{CancelSignal, DownloadProgress, NoProgress, ProgressSink};
pub use registry::DownloaderRegistry;
pub use state::DispatchStats;
pub use ytdl::{HelperBinary, YtdlDownloader};

/// A backend able to fetch some class of addresses.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Stable name recorded on the URL row.
    fn name(&self) -> &'static str;

    fn matches(&self, address: &str) -> bool;

    /// Fetch `address` to `destination` plus a backend-chosen extension.
    ///
    /// Returns the final path. A requested stop ends with
    /// [`crate::error::Error::GracefulStop`] and leaves no partial file.
    async fn fetch(
        &self,
        address: &str,
        destination: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<PathBuf>;
}
