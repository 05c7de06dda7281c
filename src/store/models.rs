//! Entity definitions.
//!
//! Entities reference each other through explicit id fields. Nothing here
//! loads relations on its own; traversal goes through [`crate::store::Store`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub type UrlId = u64;
pub type FileId = u64;
pub type DownloadId = u64;
pub type SourceId = u64;
pub type GroupId = u64;
pub type FilterId = u64;

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which kind of remote content item a post is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostKind {
    Submission,
    Comment,
}

impl PostKind {
    /// Detect the kind from a fullname such as `t3_abc123`.
    pub fn from_fullname(name: &str) -> Option<Self> {
        if name.starts_with("t3_") {
            Some(PostKind::Submission)
        } else if name.starts_with("t1_") {
            Some(PostKind::Comment)
        } else {
            None
        }
    }
}

/// A top-level submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub self_text: String,
    /// Link target. Equal to the permalink for self posts.
    pub url: String,
    pub is_self: bool,
    pub score: i64,
    pub created_utc: i64,
    pub first_found_utc: i64,
    pub nsfw: bool,
    pub flair_text: Option<String>,
    pub processed: bool,
    /// False when this row only exists as metadata for a comment.
    pub should_process: bool,
    /// Ordered gallery members, empty for non-gallery posts.
    pub gallery: Vec<String>,
}

/// A reply comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub subreddit: String,
    pub body: String,
    pub score: i64,
    pub created_utc: i64,
    pub first_found_utc: i64,
    pub parent_submission_id: String,
    pub processed: bool,
}

/// A remote content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Post {
    Submission(Submission),
    Comment(Comment),
}

impl Post {
    pub fn id(&self) -> &str {
        match self {
            Post::Submission(s) => &s.id,
            Post::Comment(c) => &c.id,
        }
    }

    pub fn kind(&self) -> PostKind {
        match self {
            Post::Submission(_) => PostKind::Submission,
            Post::Comment(_) => PostKind::Comment,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Post::Submission(s) => &s.author,
            Post::Comment(c) => &c.author,
        }
    }

    pub fn subreddit(&self) -> &str {
        match self {
            Post::Submission(s) => &s.subreddit,
            Post::Comment(c) => &c.subreddit,
        }
    }

    pub fn score(&self) -> i64 {
        match self {
            Post::Submission(s) => s.score,
            Post::Comment(c) => c.score,
        }
    }

    pub fn created_utc(&self) -> i64 {
        match self {
            Post::Submission(s) => s.created_utc,
            Post::Comment(c) => c.created_utc,
        }
    }

    /// Self text for submissions, body for comments.
    pub fn text(&self) -> &str {
        match self {
            Post::Submission(s) => &s.self_text,
            Post::Comment(c) => &c.body,
        }
    }

    pub fn post_ref(&self) -> PostRef {
        match self {
            Post::Submission(s) => PostRef::Submission(s.id.clone()),
            Post::Comment(c) => PostRef::Comment(c.id.clone()),
        }
    }
}

/// Foreign key to exactly one submission or comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostRef {
    Submission(String),
    Comment(String),
}

impl PostRef {
    pub fn id(&self) -> &str {
        match self {
            PostRef::Submission(id) | PostRef::Comment(id) => id,
        }
    }
}

/// Deduplicated download target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: UrlId,
    pub address: String,
    pub handler: String,
    pub processed: bool,
    pub failed: bool,
    pub failure_reason: Option<String>,
    pub completed_utc: i64,
    pub file_id: Option<FileId>,
}

impl UrlRecord {
    /// Build an unsaved, unprocessed record for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: 0,
            address: address.into(),
            handler: String::new(),
            processed: false,
            failed: false,
            failure_reason: None,
            completed_utc: 0,
            file_id: None,
        }
    }

    /// Mark this URL as terminally failed.
    pub fn set_failed(&mut self, reason: impl Into<String>, handler: Option<&str>) {
        self.processed = true;
        self.failed = true;
        self.failure_reason = Some(reason.into());
        self.handler = handler.unwrap_or("none").to_string();
        self.completed_utc = 0;
    }

    /// Mark this URL as completed and backed by the given file.
    pub fn set_completed(&mut self, file_id: FileId, handler: &str) {
        self.processed = true;
        self.failed = false;
        self.failure_reason = None;
        self.handler = handler.to_string();
        self.completed_utc = now_millis();
        self.file_id = Some(file_id);
    }

    /// Return to the unprocessed state so the dispatcher picks it up again.
    pub fn reset(&mut self) {
        self.processed = false;
        self.failed = false;
        self.failure_reason = None;
        self.completed_utc = 0;
    }
}

/// A downloaded artifact on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub mime_type: String,
}

/// Link between a post and a URL, with album metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub parent: PostRef,
    pub url_id: UrlId,
    pub album_id: Option<String>,
    pub is_album_parent: bool,
    pub album_padded_index: Option<String>,
}

impl DownloadRecord {
    /// Build an unsaved single-file download.
    pub fn new(parent: PostRef, url_id: UrlId) -> Self {
        Self {
            id: 0,
            parent,
            url_id,
            album_id: None,
            is_album_parent: false,
            album_padded_index: None,
        }
    }
}

/// Stored source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: SourceId,
    pub source_type: String,
    pub name: String,
    pub data_json: String,
    pub source_group_id: GroupId,
}

/// Named bundle of sources and filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceGroupRecord {
    pub id: GroupId,
    pub name: String,
    pub color: String,
}

/// Stored filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub id: FilterId,
    pub for_submissions: bool,
    pub field: String,
    pub comparator: String,
    pub value_json: String,
    pub negative_match: bool,
    pub source_group_id: GroupId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_fullname() {
        assert_eq!(PostKind::from_fullname("t3_abc"), Some(PostKind::Submission));
        assert_eq!(PostKind::from_fullname("t1_abc"), Some(PostKind::Comment));
        assert_eq!(PostKind::from_fullname("t5_abc"), None);
    }

    #[test]
    fn test_url_state_transitions() {
        let mut url = UrlRecord::new("https://i.redd.it/a.jpg");
        assert!(!url.processed && !url.failed && url.completed_utc == 0);

        url.set_failed("boom", None);
        assert!(url.processed && url.failed);
        assert_eq!(url.handler, "none");
        assert_eq!(url.failure_reason.as_deref(), Some("boom"));

        url.reset();
        assert!(!url.processed && !url.failed);
        assert_eq!(url.completed_utc, 0);

        url.set_completed(7, "direct");
        assert!(url.processed && !url.failed);
        assert!(url.completed_utc > 0);
        assert_eq!(url.file_id, Some(7));
    }
}
