//! Statistics reporting.

use console::style;

use crate::download::DispatchStats;
use crate::group::ScanSummary;

/// Print the result of scanning one group.
pub fn print_scan_summary(group: &str, summary: &ScanSummary) {
    println!();
    println!("{}", style(format!("Scan of {}:", group)).bold());
    println!("  Posts seen:     {}", summary.posts_seen);
    println!("  New posts:      {}", summary.posts_new);
    println!("  Filtered out:   {}", summary.posts_filtered);
    println!("  Already known:  {}", summary.posts_existing);
    println!("  New urls:       {}", summary.urls_new);
    println!("  Downloads:      {}", summary.downloads);
    if summary.sources_skipped > 0 {
        println!(
            "  Sources skipped: {}",
            style(summary.sources_skipped).yellow()
        );
    }
}

/// Print statistics for a dispatch run.
pub fn print_dispatch_stats(stats: &DispatchStats) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Download Statistics:").bold());
    println!("  Completed: {}", stats.completed);
    if stats.failed > 0 {
        println!("  Failed:    {}", style(stats.failed).red());
    }
    if stats.stopped > 0 {
        println!("  Stopped:   {}", style(stats.stopped).yellow());
    }
    println!("  Reused:    {} (identical files)", stats.reused);
    println!("  Skipped:   {} (already processed)", stats.skipped);
    if stats.remaining > 0 {
        println!("  Remaining: {} (left for next run)", stats.remaining);
    }
    println!("{}", style("═".repeat(50)).dim());
}

/// Print a summary line for quick viewing.
pub fn print_summary(posts: u64, urls: u64, completed: u64, failed: u64) {
    println!(
        "Found {} posts and {} urls; downloaded {} ({} failed)",
        style(posts).green(),
        style(urls).green(),
        style(completed).green(),
        style(failed).yellow()
    );
}
