//! Download progress reporting and cancellation.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// Snapshot of a running download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgress {
    pub status: String,
    /// Fraction complete in `0.0..=1.0`. Only meaningful when `knows_percent`.
    pub percent: f64,
    pub knows_percent: bool,
}

impl DownloadProgress {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            percent: 0.0,
            knows_percent: false,
        }
    }

    pub fn with_percent(status: impl Into<String>, percent: f64) -> Self {
        Self {
            status: status.into(),
            percent: percent.clamp(0.0, 1.0),
            knows_percent: true,
        }
    }
}

/// Receiver of progress updates for one download.
pub trait ProgressSink: Send + Sync {
    fn update(&self, progress: DownloadProgress);

    /// Called once when the download ends, successfully or not.
    fn finish(&self) {}
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _progress: DownloadProgress) {}
}

/// Sink that keeps the latest update, for inspection.
#[derive(Debug, Default)]
pub struct LatestProgress {
    latest: Mutex<Option<DownloadProgress>>,
}

impl LatestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<DownloadProgress> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressSink for LatestProgress {
    fn update(&self, progress: DownloadProgress) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(progress);
        }
    }
}

/// Cooperative stop request shared between a caller and running downloads.
///
/// Clones observe the same signal. Child signals stop with their parent but
/// can also be stopped on their own.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that is stopped when this one is.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn should_stop(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a stop is requested.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}
