//! Backend selection by address.

use std::path::Path;
use std::sync::Arc;

use reqwest::Client;

use crate::download::direct::DirectDownloader;
use crate::download::ytdl::YtdlDownloader;
use crate::download::Downloader;

/// Ordered backends. The first one whose `matches` accepts an address wins.
#[derive(Clone, Default)]
pub struct DownloaderRegistry {
    handlers: Vec<Arc<dyn Downloader>>,
}

impl DownloaderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `ytdl` first so video pages never fall through to plain HTTP, then `direct`.
    pub fn builtin(client: Client, ytdl_path: Option<&Path>) -> Self {
        let mut registry = Self::empty();
        registry.push(Arc::new(YtdlDownloader::locate(ytdl_path)));
        registry.push(Arc::new(DirectDownloader::new(client)));
        registry
    }

    pub fn push(&mut self, handler: Arc<dyn Downloader>) {
        self.handlers.push(handler);
    }

    pub fn handler_for(&self, address: &str) -> Option<Arc<dyn Downloader>> {
        self.handlers
            .iter()
            .find(|handler| handler.matches(address))
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

impl std::fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DownloaderRegistry {
        DownloaderRegistry::builtin(Client::new(), Some(Path::new("/nonexistent/yt-dlp")))
    }

    #[test]
    fn test_builtin_order() {
        assert_eq!(registry().names(), vec!["ytdl", "direct"]);
    }

    #[test]
    fn test_first_match_wins() {
        let registry = registry();
        let pick = |address: &str| registry.handler_for(address).map(|h| h.name());

        assert_eq!(pick("https://v.redd.it/abc"), Some("ytdl"));
        assert_eq!(pick("https://i.redd.it/abc.jpg"), Some("direct"));
        assert_eq!(pick("https://example.com/blog/post"), None);
    }
}
