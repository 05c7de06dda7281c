//! Converting raw API items into posts, completing lazily-loaded items.

use serde_json::Value;

use crate::api::{ContentApi, RawItem};
use crate::error::{Error, Result};
use crate::store::{now_millis, Comment, Post, PostKind, Submission};

/// Fields a submission must carry before it can be converted.
const SUBMISSION_FIELDS: &[&str] = &[
    "name",
    "title",
    "author",
    "subreddit",
    "selftext",
    "url",
    "is_self",
    "score",
    "created_utc",
    "over_18",
    "link_flair_text",
];

/// Fields a comment must carry before it can be converted.
const COMMENT_FIELDS: &[&str] = &[
    "name",
    "author",
    "subreddit",
    "body",
    "score",
    "created_utc",
    "link_id",
];

/// Resolve a raw item into a post.
///
/// Missing fields trigger exactly one completion fetch. Fields still missing
/// afterwards yield `Error::IncompleteItem`.
pub async fn resolve_post(api: &dyn ContentApi, raw: RawItem) -> Result<Post> {
    let required = match raw.kind {
        PostKind::Submission => SUBMISSION_FIELDS,
        PostKind::Comment => COMMENT_FIELDS,
    };

    let raw = complete(api, raw, required).await?;

    match raw.kind {
        PostKind::Submission => submission_from_raw(&raw).map(Post::Submission),
        PostKind::Comment => comment_from_raw(&raw).map(Post::Comment),
    }
}

async fn complete(api: &dyn ContentApi, mut raw: RawItem, required: &[&str]) -> Result<RawItem> {
    let mut fetched = false;

    for key in required {
        if raw.has_field(key) {
            continue;
        }
        if fetched {
            return Err(incomplete(&raw, key));
        }

        tracing::debug!(
            "Item {} missing '{}', fetching full object",
            raw.name().unwrap_or("<unnamed>"),
            key
        );
        let kind = raw.kind;
        raw = api.fetch_full(&raw).await?;
        fetched = true;

        if raw.kind != kind {
            return Err(Error::Api(format!(
                "Completion fetch for {} returned a different kind",
                raw.name().unwrap_or("<unnamed>")
            )));
        }
        if !raw.has_field(key) {
            return Err(incomplete(&raw, key));
        }
    }

    Ok(raw)
}

fn incomplete(raw: &RawItem, field: &str) -> Error {
    Error::IncompleteItem {
        id: raw.name().unwrap_or("<unnamed>").to_string(),
        field: field.to_string(),
    }
}

fn string_field(raw: &RawItem, key: &str) -> Result<String> {
    match raw.field(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        _ => Err(incomplete(raw, key)),
    }
}

fn optional_string_field(raw: &RawItem, key: &str) -> Result<Option<String>> {
    match raw.field(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Null) => Ok(None),
        _ => Err(incomplete(raw, key)),
    }
}

fn int_field(raw: &RawItem, key: &str) -> Result<i64> {
    raw.field(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or_else(|| incomplete(raw, key))
}

fn bool_field(raw: &RawItem, key: &str) -> Result<bool> {
    raw.field(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| incomplete(raw, key))
}

/// Author names come back null for deleted accounts.
fn author_field(raw: &RawItem) -> Result<String> {
    let author = string_field(raw, "author")?;
    Ok(if author.is_empty() {
        "[deleted]".to_string()
    } else {
        author
    })
}

/// `created_utc` is epoch seconds upstream; stored as milliseconds.
fn created_millis(raw: &RawItem) -> Result<i64> {
    raw.field("created_utc")
        .and_then(Value::as_f64)
        .map(|secs| (secs * 1000.0) as i64)
        .ok_or_else(|| incomplete(raw, "created_utc"))
}

fn submission_from_raw(raw: &RawItem) -> Result<Submission> {
    Ok(Submission {
        id: string_field(raw, "name")?,
        title: string_field(raw, "title")?,
        author: author_field(raw)?,
        subreddit: string_field(raw, "subreddit")?,
        self_text: string_field(raw, "selftext")?,
        url: string_field(raw, "url")?,
        is_self: bool_field(raw, "is_self")?,
        score: int_field(raw, "score")?,
        created_utc: created_millis(raw)?,
        first_found_utc: now_millis(),
        nsfw: bool_field(raw, "over_18")?,
        flair_text: optional_string_field(raw, "link_flair_text")?,
        processed: false,
        should_process: true,
        gallery: gallery_urls(raw),
    })
}

fn comment_from_raw(raw: &RawItem) -> Result<Comment> {
    Ok(Comment {
        id: string_field(raw, "name")?,
        author: author_field(raw)?,
        subreddit: string_field(raw, "subreddit")?,
        body: string_field(raw, "body")?,
        score: int_field(raw, "score")?,
        created_utc: created_millis(raw)?,
        first_found_utc: now_millis(),
        parent_submission_id: string_field(raw, "link_id")?,
        processed: false,
    })
}

/// Ordered media addresses of a gallery post. Empty for anything else.
fn gallery_urls(raw: &RawItem) -> Vec<String> {
    if raw.field("is_gallery").and_then(Value::as_bool) != Some(true) {
        return Vec::new();
    }

    let Some(items) = raw
        .field("gallery_data")
        .and_then(|g| g.get("items"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let metadata = raw.field("media_metadata");

    items
        .iter()
        .filter_map(|item| item.get("media_id").and_then(Value::as_str))
        .filter_map(|media_id| {
            let meta = metadata.and_then(|m| m.get(media_id));
            let source = meta.and_then(|m| m.get("s"));
            let direct = source.and_then(|s| {
                s.get("u")
                    .or_else(|| s.get("gif"))
                    .or_else(|| s.get("mp4"))
                    .and_then(Value::as_str)
            });

            if let Some(url) = direct {
                return Some(url.to_string());
            }

            // Fall back to the canonical image host using the declared mime type.
            let ext = meta
                .and_then(|m| m.get("m"))
                .and_then(Value::as_str)
                .and_then(|m| m.rsplit('/').next())
                .unwrap_or("jpg");
            Some(format!("https://i.redd.it/{}.{}", media_id, ext))
        })
        .collect()
}
