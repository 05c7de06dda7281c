//! Progress bar utilities.

use indicatif::{ProgressBar, ProgressStyle};

use crate::download::{DownloadProgress, ProgressSink};

/// Create a spinner for long-running operations.
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

/// Progress bar for one download, scaled to percent.
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_prefix(label.to_string());
        Self { bar }
    }

    /// A sink that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressSink for ProgressBarSink {
    fn update(&self, progress: DownloadProgress) {
        if progress.knows_percent {
            self.bar.set_position((progress.percent * 100.0).round() as u64);
        } else {
            self.bar.tick();
        }
        self.bar.set_message(progress.status);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
