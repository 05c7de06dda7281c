//! Video downloads through an external yt-dlp compatible helper.
//!
//! The helper picks the output extension itself, so it writes to a
//! hash-named template and the result is found and renamed afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use url::Url;

use crate::download::progress::{CancelSignal, DownloadProgress, ProgressSink};
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, make_unique_filename, temp_name, with_appended_extension};

/// Binary names searched on `PATH`, in order.
const CANDIDATES: &[&str] = &["yt-dlp", "youtube-dl"];

/// Best video and audio merged, limited to HTTP protocols.
const FORMAT: &str = "(bestvideo+bestaudio/best)[protocol^=http]";

/// Hosts whose pages need the helper to extract media.
const VIDEO_HOSTS: &[&str] = &[
    "v.redd.it",
    "youtube.com",
    "youtu.be",
    "gfycat.com",
    "redgifs.com",
    "streamable.com",
    "vimeo.com",
    "twitter.com",
    "x.com",
    "clips.twitch.tv",
];

/// How much helper stderr is kept for error messages.
const STDERR_TAIL: usize = 400;

/// A located helper executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperBinary {
    path: PathBuf,
}

impl HelperBinary {
    /// Use `explicit` if given, otherwise search `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return if path.is_file() {
                Ok(Self {
                    path: path.to_path_buf(),
                })
            } else {
                Err(Error::MissingTool(format!(
                    "yt-dlp not found at {}",
                    path.display()
                )))
            };
        }

        CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| Self { path })
            .ok_or_else(|| {
                Error::MissingTool(format!("none of {} found in PATH", CANDIDATES.join(", ")))
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn progress_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("progress pattern is valid")
    })
}

/// Fraction complete from a `[download]  42.0% of ...` line.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let captures = progress_pattern().captures(line.trim_start())?;
    let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(percent / 100.0)
}

/// Progress update for one line of helper output, if it is a download line.
///
/// Download lines without a percentage still report that work is ongoing.
pub fn progress_for_line(line: &str) -> Option<DownloadProgress> {
    if let Some(fraction) = parse_progress_line(line) {
        return Some(DownloadProgress::with_percent("Downloading with YTDL...", fraction));
    }
    line.trim_start()
        .starts_with("[download]")
        .then(|| DownloadProgress::status("Downloading with YTDL..."))
}

/// Downloads video pages with the helper.
#[derive(Debug, Clone)]
pub struct YtdlDownloader {
    binary: std::result::Result<HelperBinary, String>,
}

impl YtdlDownloader {
    pub fn new(binary: HelperBinary) -> Self {
        Self { binary: Ok(binary) }
    }

    /// Locate the helper now. A missing helper is reported on every fetch.
    pub fn locate(explicit: Option<&Path>) -> Self {
        match HelperBinary::locate(explicit) {
            Ok(binary) => Self::new(binary),
            Err(e) => {
                tracing::warn!("Video downloads disabled: {}", e);
                Self {
                    binary: Err(e.to_string()),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_ok()
    }

    fn binary(&self) -> Result<&HelperBinary> {
        self.binary
            .as_ref()
            .map_err(|reason| Error::MissingTool(reason.clone()))
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Stop the helper and wait for it so no process outlives the request.
async fn terminate(child: &mut Child, dir: &Path, hash: &str, reason: &str) -> Error {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill helper: {}", e);
    }
    remove_partials(dir, hash).await;
    Error::GracefulStop(reason.to_string())
}

async fn remove_partials(dir: &Path, hash: &str) {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(hash) {
            let _ = fs::remove_file(entry.path()).await;
        }
    }
}

/// The finished output: named after the hash, not a partial.
async fn find_output(dir: &Path, hash: &str) -> Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(hash) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

#[async_trait]
impl Downloader for YtdlDownloader {
    fn name(&self) -> &'static str {
        "ytdl"
    }

    fn matches(&self, address: &str) -> bool {
        let Ok(url) = Url::parse(address) else {
            return false;
        };
        let host = url.host_str().unwrap_or_default();
        if VIDEO_HOSTS.iter().any(|domain| host_matches(host, domain)) {
            return true;
        }
        host_matches(host, "reddit.com") && url.path().contains("/comments/")
    }

    async fn fetch(
        &self,
        address: &str,
        destination: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<PathBuf> {
        let binary = self.binary()?;
        if cancel.should_stop() {
            return Err(Error::GracefulStop("YTDL not started".into()));
        }

        let dir = destination
            .parent()
            .ok_or_else(|| Error::Download("Destination has no parent directory".into()))?;
        ensure_dir(dir).await?;

        let hash = temp_name(address);
        let template = dir.join(format!("{}.%(ext)s", hash));
        tracing::debug!("Running {} for {}", binary.path().display(), address);
        progress.update(DownloadProgress::status("Starting YTDL..."));

        let mut child = Command::new(binary.path())
            .arg(address)
            .arg("--output")
            .arg(&template)
            .args(["--format", FORMAT, "--no-playlist", "--newline", "--add-metadata"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::MissingTool(format!("{} could not be executed", binary.path().display()))
                } else {
                    Error::Download(format!("Failed to start helper: {}", e))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Download("Helper stdout unavailable".into()))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                _ = cancel.stopped() => {
                    return Err(terminate(&mut child, dir, &hash, "YTDL terminated child").await);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if cancel.should_stop() {
                            return Err(terminate(&mut child, dir, &hash, "YTDL terminated child").await);
                        }
                        if let Some(update) = progress_for_line(&line) {
                            progress.update(update);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!("Helper output unreadable: {}", e);
                        break;
                    }
                },
            }
        }

        let status = tokio::select! {
            _ = cancel.stopped() => {
                return Err(terminate(&mut child, dir, &hash, "YTDL child exit").await);
            }
            status = child.wait() => status?,
        };

        if cancel.should_stop() {
            remove_partials(dir, &hash).await;
            return Err(Error::GracefulStop("YTDL child exit".into()));
        }

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            remove_partials(dir, &hash).await;
            let trimmed = stderr.trim();
            let start = trimmed
                .char_indices()
                .rev()
                .nth(STDERR_TAIL)
                .map(|(i, _)| i)
                .unwrap_or(0);
            return Err(Error::Download(format!(
                "Helper exited with {}: {}",
                status,
                &trimmed[start..]
            )));
        }

        let output = find_output(dir, &hash)
            .await?
            .ok_or_else(|| Error::Download("No file found matching hash".into()))?;
        let ext = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let final_path = make_unique_filename(&with_appended_extension(destination, &ext));
        fs::rename(&output, &final_path).await?;
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::{LatestProgress, NoProgress};

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("[download]  42.5% of 10.00MiB at 1.00MiB/s"), Some(0.425));
        assert_eq!(parse_progress_line("[download] 100% of 3MiB"), Some(1.0));
        assert_eq!(parse_progress_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_line("[download] Destination: x.mp4"), None);
    }

    #[test]
    fn test_download_lines_without_percent_report_status() {
        let update = progress_for_line("[download] Destination: clip.mp4").unwrap();
        assert!(!update.knows_percent);
        assert_eq!(update.status, "Downloading with YTDL...");

        let update = progress_for_line("[download]  10.0% of 4MiB").unwrap();
        assert!(update.knows_percent);
        assert_eq!(update.percent, 0.1);

        assert!(progress_for_line("[youtube] abc: Downloading webpage").is_none());
    }

    #[test]
    fn test_matches_video_hosts() {
        let d = YtdlDownloader::locate(Some(Path::new("/nonexistent/yt-dlp")));
        assert!(d.matches("https://v.redd.it/abc123"));
        assert!(d.matches("https://www.youtube.com/watch?v=x"));
        assert!(d.matches("https://www.reddit.com/r/videos/comments/abc/title/"));
        assert!(!d.matches("https://i.redd.it/a.jpg"));
        assert!(!d.matches("https://notyoutube.com/watch"));
    }

    #[tokio::test]
    async fn test_missing_tool_reported() {
        assert!(matches!(
            HelperBinary::locate(Some(Path::new("/nonexistent/yt-dlp"))),
            Err(Error::MissingTool(_))
        ));

        let d = YtdlDownloader::locate(Some(Path::new("/nonexistent/yt-dlp")));
        assert!(!d.is_available());
        let dir = tempfile::tempdir().unwrap();
        let result = d
            .fetch(
                "https://v.redd.it/abc",
                &dir.path().join("clip"),
                &NoProgress,
                &CancelSignal::new(),
            )
            .await;
        assert!(matches!(result, Err(Error::MissingTool(_))));
    }

    #[cfg(unix)]
    fn fake_helper(dir: &Path, body: &str) -> HelperBinary {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ytdl");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        HelperBinary::locate(Some(&path)).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_renames_output() {
        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let helper = fake_helper(
            bin_dir.path(),
            r#"out=$(echo "$3" | sed 's/%(ext)s/mp4/')
echo "[download]  50.0% of 1MiB"
printf video > "$out"
echo "[download] 100.0% of 1MiB""#,
        );

        let progress = LatestProgress::new();
        let path = YtdlDownloader::new(helper)
            .fetch(
                "https://v.redd.it/abc",
                &out_dir.path().join("clip"),
                &progress,
                &CancelSignal::new(),
            )
            .await
            .unwrap();

        assert_eq!(path, out_dir.path().join("clip.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"video");
        assert_eq!(progress.latest().unwrap().percent, 1.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_reports_stderr() {
        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let helper = fake_helper(bin_dir.path(), "echo 'ERROR: Unsupported URL' >&2\nexit 1");

        let result = YtdlDownloader::new(helper)
            .fetch(
                "https://v.redd.it/abc",
                &out_dir.path().join("clip"),
                &NoProgress,
                &CancelSignal::new(),
            )
            .await;
        match result {
            Err(Error::Download(message)) => assert!(message.contains("Unsupported URL")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let pid_file = bin_dir.path().join("pid");
        let helper = fake_helper(
            bin_dir.path(),
            &format!(
                "echo $$ > '{}'\necho '[download]   1.0% of 9MiB'\nexec sleep 30",
                pid_file.display()
            ),
        );

        let cancel = CancelSignal::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            stopper.stop();
        });

        let started = std::time::Instant::now();
        let result = YtdlDownloader::new(helper)
            .fetch(
                "https://v.redd.it/abc",
                &out_dir.path().join("clip"),
                &NoProgress,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(Error::GracefulStop(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .status()
            .unwrap()
            .success();
        assert!(!alive, "helper process still running");
    }
}
