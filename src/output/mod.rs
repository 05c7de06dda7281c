//! Output module for console output and progress.
//!
//! Provides:
//! - Colored console output
//! - Per-download progress bars
//! - Scan and download statistics

pub mod console;
pub mod progress;
pub mod stats;

pub use console::{
    print_banner, print_config_summary, print_error, print_group_header, print_info,
    print_success, print_warning,
};
pub use progress::{create_spinner, ProgressBarSink};
pub use stats::{print_dispatch_stats, print_scan_summary, print_summary};
