//! Plain HTTP downloads of direct media links.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::download::progress::{CancelSignal, DownloadProgress, ProgressSink};
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, make_unique_filename, temp_name, with_appended_extension};

/// Hosts that only ever serve raw media.
const MEDIA_HOSTS: &[&str] = &["i.redd.it", "i.imgur.com", "preview.redd.it", "i.reddituploads.com"];

/// Fetches addresses that point straight at a media file.
#[derive(Debug, Clone)]
pub struct DirectDownloader {
    client: Client,
}

impl DirectDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Media extension in the address path, if any.
    fn path_extension(address: &Url) -> Option<String> {
        let last = address.path_segments()?.last()?;
        let (_, ext) = last.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        let mime = mime_guess::from_ext(&ext).first()?;
        matches!(mime.type_().as_str(), "image" | "video" | "audio").then_some(ext)
    }

    /// imgur serves `.gifv` as an HTML player; the `.mp4` beside it is the media.
    fn rewrite(address: &str) -> String {
        match address.strip_suffix(".gifv") {
            Some(stem) => format!("{}.mp4", stem),
            None => address.to_string(),
        }
    }
}

fn extension_for_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let preferred = match essence.as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "audio/mpeg" => Some("mp3"),
        _ => None,
    };
    preferred.map(str::to_string).or_else(|| {
        mime_guess::get_mime_extensions_str(&essence)
            .and_then(|exts| exts.first())
            .map(|e| e.to_string())
    })
}

#[async_trait]
impl Downloader for DirectDownloader {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn matches(&self, address: &str) -> bool {
        let Ok(url) = Url::parse(address) else {
            return false;
        };
        let host = url.host_str().unwrap_or_default();
        MEDIA_HOSTS.contains(&host) || Self::path_extension(&url).is_some()
    }

    async fn fetch(
        &self,
        address: &str,
        destination: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<PathBuf> {
        let address = Self::rewrite(address);
        tracing::debug!("GET {}", address);
        progress.update(DownloadProgress::status("Connecting..."));

        let response = self
            .client
            .get(&address)
            .send()
            .await
            .map_err(|e| Error::Download(format!("Request failed for {}: {}", address, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!("HTTP {} for {}", status, address)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type.starts_with("text/html") {
            return Err(Error::Download(format!(
                "{} returned a web page instead of media",
                address
            )));
        }

        let ext = Url::parse(&address)
            .ok()
            .and_then(|u| Self::path_extension(&u))
            .or_else(|| extension_for_content_type(&content_type))
            .unwrap_or_else(|| "bin".to_string());

        let parent = destination
            .parent()
            .ok_or_else(|| Error::Download("Destination has no parent directory".into()))?;
        ensure_dir(parent).await?;
        let temp_path = parent.join(format!("{}.part", temp_name(&address)));

        let total = response.content_length();
        let mut file = File::create(&temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.should_stop() {
                drop(file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(Error::GracefulStop("Direct download cancelled".into()));
            }

            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(Error::Download(format!("Stream error: {}", e)));
                }
            };
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            match total {
                Some(total) if total > 0 => progress.update(DownloadProgress::with_percent(
                    "Downloading...",
                    downloaded as f64 / total as f64,
                )),
                _ => progress.update(DownloadProgress::status("Downloading...")),
            }
        }

        file.flush().await?;
        drop(file);

        let final_path = make_unique_filename(&with_appended_extension(destination, &ext));
        fs::rename(&temp_path, &final_path).await?;
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::{LatestProgress, NoProgress};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> DirectDownloader {
        DirectDownloader::new(Client::new())
    }

    #[test]
    fn test_matches_media_links() {
        let d = downloader();
        assert!(d.matches("https://i.redd.it/abc"));
        assert!(d.matches("https://example.com/pic.JPG"));
        assert!(d.matches("https://example.com/clip.mp4?x=1"));
        assert!(!d.matches("https://example.com/article.html"));
        assert!(!d.matches("https://v.redd.it/abc"));
        assert!(!d.matches("not a url"));
    }

    #[test]
    fn test_gifv_rewritten() {
        assert_eq!(
            DirectDownloader::rewrite("https://i.imgur.com/a.gifv"),
            "https://i.imgur.com/a.mp4"
        );
    }

    #[test]
    fn test_content_type_extension() {
        assert_eq!(extension_for_content_type("image/jpeg; charset=x").as_deref(), Some("jpg"));
        assert_eq!(extension_for_content_type("video/mp4").as_deref(), Some("mp4"));
    }

    #[tokio::test]
    async fn test_fetch_streams_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/pic.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png-bytes".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sub").join("My post");
        let progress = LatestProgress::new();
        let path = downloader()
            .fetch(
                &format!("{}/media/pic.png", server.uri()),
                &dest,
                &progress,
                &CancelSignal::new(),
            )
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("sub").join("My post.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
        assert!(progress.latest().unwrap().knows_percent);
    }

    #[tokio::test]
    async fn test_fetch_rejects_error_status_and_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x");
        for route in ["/gone.jpg", "/page.jpg"] {
            let result = downloader()
                .fetch(
                    &format!("{}{}", server.uri(), route),
                    &dest,
                    &NoProgress,
                    &CancelSignal::new(),
                )
                .await;
            assert!(matches!(result, Err(Error::Download(_))));
        }
    }

    #[tokio::test]
    async fn test_fetch_honours_cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelSignal::new();
        cancel.stop();
        let result = downloader()
            .fetch(
                &format!("{}/big.mp4", server.uri()),
                &dir.path().join("big"),
                &NoProgress,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(Error::GracefulStop(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
