//! Console output utilities.

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the heading shown before a group is scanned.
pub fn print_group_header(name: &str, sources: usize, filters: usize) {
    println!();
    println!(
        "{} {} ({} sources, {} filters)",
        style("GROUP").magenta().bold(),
        style(name).bold(),
        sources,
        filters
    );
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     Reddit Media Downloader                           ║
║     Saved, upvoted and subreddit media to disk        ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(groups: &[String], video_helper: Option<&str>, download_dir: &str) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Groups: {}", groups.join(", "));
    println!("  Video helper: {}", video_helper.unwrap_or("not found"));
    println!("  Directory: {}", download_dir);
    println!();
}
