//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Reddit media downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "rmd",
    version,
    about = "Download media linked from Reddit posts",
    long_about = "A CLI tool to download images and videos linked from saved, upvoted and subreddit posts.\n\n\
                  Posts are gathered per source group, filtered, and every linked media file is downloaded once."
)]
pub struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Only scan these groups. Can be given more than once.
    #[arg(short, long = "group")]
    pub groups: Vec<String>,

    /// Base directory for downloads.
    #[arg(short = 'd', long = "directory")]
    pub download_directory: Option<PathBuf>,

    /// OAuth refresh token.
    #[arg(short, long, env = "RMD_REFRESH_TOKEN")]
    pub token: Option<String>,

    /// User agent sent to the API.
    #[arg(short = 'a', long = "user-agent", env = "RMD_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Path to the yt-dlp binary.
    #[arg(long = "ytdl")]
    pub ytdl_path: Option<PathBuf>,

    /// Scan groups without downloading.
    #[arg(long, conflicts_with = "download_only")]
    pub scan_only: bool,

    /// Download pending urls without scanning.
    #[arg(long)]
    pub download_only: bool,

    /// Reset failed urls so they are downloaded again.
    #[arg(long)]
    pub retry_failed: bool,

    /// Hide download progress bars.
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.account.refresh_token = token.clone();
        }

        if let Some(user_agent) = &self.user_agent {
            config.account.user_agent = user_agent.clone();
        }

        if let Some(dir) = &self.download_directory {
            config.options.download_directory = Some(dir.clone());
        }

        if let Some(path) = &self.ytdl_path {
            config.options.ytdl_path = Some(path.clone());
        }

        if self.quiet {
            config.options.show_progress = false;
        }
    }

    /// Whether a configured group was selected on the command line.
    pub fn selects_group(&self, name: &str) -> bool {
        self.groups.is_empty() || self.groups.iter().any(|g| g.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides() {
        let args = Args::parse_from([
            "rmd",
            "--token",
            "cli-token",
            "--directory",
            "/data",
            "--ytdl",
            "/opt/yt-dlp",
            "--quiet",
        ]);
        let mut config = Config::default();
        args.merge_into_config(&mut config);

        assert_eq!(config.account.refresh_token, "cli-token");
        assert_eq!(config.options.download_directory, Some(PathBuf::from("/data")));
        assert_eq!(config.options.ytdl_path, Some(PathBuf::from("/opt/yt-dlp")));
        assert!(!config.options.show_progress);
    }

    #[test]
    fn test_group_selection() {
        let all = Args::parse_from(["rmd"]);
        assert!(all.selects_group("anything"));

        let some = Args::parse_from(["rmd", "-g", "Cats", "--group", "news"]);
        assert!(some.selects_group("cats"));
        assert!(!some.selects_group("dogs"));
    }

    #[test]
    fn test_scan_only_conflicts_with_download_only() {
        assert!(Args::try_parse_from(["rmd", "--scan-only", "--download-only"]).is_err());
    }
}
