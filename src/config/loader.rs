//! Configuration structures and loading logic.

use crate::api::Credentials;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Store snapshot file, kept in the download directory.
pub const STORE_FILE_NAME: &str = ".rmd-store.json";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    /// Source groups to scan, in order.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

/// Account credentials configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// OAuth refresh token of the authorized account.
    #[serde(default)]
    pub refresh_token: String,

    /// OAuth application id.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Empty for installed applications.
    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Download options configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Base directory for downloads.
    #[serde(default)]
    pub download_directory: Option<PathBuf>,

    /// Explicit yt-dlp binary. Searched on `PATH` when unset.
    #[serde(default)]
    pub ytdl_path: Option<PathBuf>,

    /// Whether to show per-download progress bars.
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Whether to hash finished files and reuse identical ones.
    #[serde(default = "default_true")]
    pub hash_files: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            download_directory: None,
            ytdl_path: None,
            show_progress: true,
            hash_files: true,
        }
    }
}

/// A named bundle of sources and filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub sources: Vec<SourceEntry>,

    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// One configured source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    #[serde(rename = "type")]
    pub source_type: String,

    pub name: String,

    /// Variant-specific settings, checked against the variant schema.
    #[serde(default)]
    pub data: toml::Table,
}

/// One configured filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Applies to submissions when true, comments when false.
    #[serde(default = "default_true")]
    pub for_submissions: bool,

    pub field: String,

    pub comparator: String,

    pub value: toml::Value,

    #[serde(default)]
    pub negative_match: bool,
}

fn default_client_id() -> String {
    "v4XVrdEH_A-ZaA".to_string()
}

fn default_user_agent() -> String {
    format!("rust:reddit-media-downloader:v{}", env!("CARGO_PKG_VERSION"))
}

fn default_color() -> String {
    "#3b82f6".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective download directory.
    pub fn download_directory(&self) -> PathBuf {
        self.options
            .download_directory
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Where the store snapshot lives between runs.
    pub fn store_path(&self) -> PathBuf {
        self.download_directory().join(STORE_FILE_NAME)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.account.client_id.clone(),
            client_secret: self.account.client_secret.clone(),
            refresh_token: self.account.refresh_token.clone(),
            user_agent: self.account.user_agent.clone(),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            refresh_token: String::new(),
            client_id: default_client_id(),
            client_secret: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[account]
refresh_token = "abc"

[options]
download_directory = "/tmp/rmd"
hash_files = false

[[groups]]
name = "cats"

[[groups.sources]]
type = "subreddit-posts"
name = "aww"
data = { subreddit = "aww", type = "top", limit = 10 }

[[groups.filters]]
field = "title"
comparator = "c"
value = "cat"
"#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.account.refresh_token, "abc");
        assert_eq!(config.account.client_id, "v4XVrdEH_A-ZaA");
        assert!(!config.options.hash_files);
        assert!(config.options.show_progress);

        let group = &config.groups[0];
        assert_eq!(group.color, "#3b82f6");
        assert_eq!(group.sources[0].source_type, "subreddit-posts");
        assert_eq!(group.sources[0].data["limit"].as_integer(), Some(10));
        assert!(group.filters[0].for_submissions);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(loaded.groups[0].sources[0].name, "aww");
    }

    #[test]
    fn test_store_path_is_in_download_directory() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/tmp/rmd/.rmd-store.json"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
