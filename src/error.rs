//! Error types for the reddit-media-downloader application.

use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Source / filter configuration errors
    #[error("Invalid source config for field '{field}': {message}")]
    InvalidSourceConfig { field: String, message: String },

    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("Invalid filter on field '{field}': {message}")]
    InvalidFilter { field: String, message: String },

    // API errors
    #[error("API error: {0}")]
    Api(String),

    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Item {id} is missing field '{field}' after completion fetch")]
    IncompleteItem { id: String, field: String },

    // Download errors
    #[error("Download failed: {0}")]
    Download(String),

    #[error("Required tool is missing: {0}")]
    MissingTool(String),

    #[error("Stopped: {0}")]
    GracefulStop(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Media errors
    #[error("Invalid media: {0}")]
    Media(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors that must abort a whole scan instead of being skipped per item or per source.
    pub fn is_fatal_to_scan(&self) -> bool {
        matches!(self, Error::UpstreamAuth(_) | Error::Storage(_))
    }

    /// Whether this error was caused by a user-requested stop.
    pub fn is_graceful_stop(&self) -> bool {
        matches!(self, Error::GracefulStop(_))
    }
}

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const API_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
    pub const SOME_GROUPS_FAILED: i32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::UpstreamAuth("no token".into()).is_fatal_to_scan());
        assert!(Error::Storage("broken".into()).is_fatal_to_scan());
        assert!(!Error::IncompleteItem {
            id: "t3_x".into(),
            field: "title".into()
        }
        .is_fatal_to_scan());
        assert!(!Error::InvalidSourceConfig {
            field: "limit".into(),
            message: "bad".into()
        }
        .is_fatal_to_scan());
    }

    #[test]
    fn test_graceful_stop_message_is_tagged() {
        let err = Error::GracefulStop("ytdl child terminated".into());
        assert!(err.is_graceful_stop());
        assert_eq!(err.to_string(), "Stopped: ytdl child terminated");
    }
}
