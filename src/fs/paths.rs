//! Output path layout.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::fs::naming::text_component;
use crate::store::{DownloadRecord, Post};

/// Extension-less destination for one download.
///
/// `<base>/<subreddit>/<title>` for single files and
/// `<base>/<subreddit>/<title>/<padded index>` for album members. Comments
/// use their id in place of a title.
pub fn download_target(base: &Path, post: &Post, download: &DownloadRecord) -> PathBuf {
    let subreddit = text_component(post.subreddit(), "unknown_subreddit");
    let name = match post {
        Post::Submission(s) => text_component(&s.title, &s.id),
        Post::Comment(c) => text_component(&c.id, "comment"),
    };

    let folder = base.join(subreddit);
    match (&download.album_id, &download.album_padded_index) {
        (Some(_), Some(index)) => folder.join(name).join(text_component(index, "000")),
        _ => folder.join(name),
    }
}

/// Short stable name derived from an address, used for in-progress files.
pub fn temp_name(address: &str) -> String {
    let digest = format!("{:x}", Md5::digest(address.as_bytes()));
    digest[..20].to_string()
}

/// Append `.ext` to a path without treating dots in the name as an extension.
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Ensure a directory exists, creating it if necessary.
pub async fn ensure_dir(path: &Path) -> crate::error::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
