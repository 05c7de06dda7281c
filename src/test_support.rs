//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::api::{ContentApi, Listing, ListingKind, RawItem};
use crate::error::{Error, Result};
use crate::store::{Comment, PostKind, Submission};

/// In-memory `ContentApi` serving canned listings and items.
#[derive(Default)]
pub struct FixtureApi {
    items: Mutex<HashMap<String, RawItem>>,
    listings: Mutex<HashMap<ListingKind, Vec<RawItem>>>,
    auth_failure: AtomicBool,
    page_auth_failure: AtomicBool,
    pub full_fetches: AtomicUsize,
    pub listings_started: AtomicUsize,
}

impl FixtureApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item reachable through `fetch_by_id`.
    pub fn add_item(&self, item: RawItem) {
        let name = item.name().unwrap_or_default().to_string();
        self.items.lock().unwrap().insert(name, item);
    }

    pub fn set_listing(&self, kind: ListingKind, items: Vec<RawItem>) {
        self.listings.lock().unwrap().insert(kind, items);
    }

    /// Make `start_listing` fail as if no account were authorized.
    pub fn fail_with_auth_error(&self) {
        self.auth_failure.store(true, Ordering::SeqCst);
    }

    /// Make every page fetch fail with an authentication error.
    pub fn fail_pages_with_auth_error(&self) {
        self.page_auth_failure.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentApi for FixtureApi {
    async fn fetch_by_id(&self, id: &str) -> Result<RawItem> {
        self.full_fetches.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Api(format!("Item not found: {}", id)))
    }

    async fn start_listing(&self, kind: &ListingKind) -> Result<Box<dyn Listing>> {
        if self.auth_failure.load(Ordering::SeqCst) {
            return Err(Error::UpstreamAuth("no refresh token".into()));
        }
        self.listings_started.fetch_add(1, Ordering::SeqCst);
        let items = self
            .listings
            .lock()
            .unwrap()
            .get(kind)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(FixtureListing {
            items,
            position: 0,
            fail_auth: self.page_auth_failure.load(Ordering::SeqCst),
        }))
    }
}

struct FixtureListing {
    items: Vec<RawItem>,
    position: usize,
    fail_auth: bool,
}

#[async_trait]
impl Listing for FixtureListing {
    async fn fetch_more(&mut self, page_size: usize) -> Result<Vec<RawItem>> {
        if self.fail_auth {
            return Err(Error::UpstreamAuth("token revoked".into()));
        }
        let end = (self.position + page_size).min(self.items.len());
        let page = self.items[self.position..end].to_vec();
        self.position = end;
        Ok(page)
    }
}

fn raw(kind: PostKind, value: Value) -> RawItem {
    let data: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    RawItem { kind, data }
}

/// A complete link submission.
pub fn raw_submission(name: &str, title: &str, url: &str) -> RawItem {
    raw(
        PostKind::Submission,
        json!({
            "name": name,
            "title": title,
            "author": "test-author",
            "subreddit": "test_sub",
            "selftext": "",
            "url": url,
            "is_self": false,
            "score": 1,
            "created_utc": 1_600_000_000.0,
            "over_18": false,
            "link_flair_text": null,
        }),
    )
}

/// A complete self submission.
pub fn raw_self_post(name: &str, title: &str, text: &str) -> RawItem {
    let mut item = raw_submission(name, title, &format!("https://www.reddit.com/r/test_sub/comments/{}/", name));
    item.data.insert("is_self".into(), Value::Bool(true));
    item.data.insert("selftext".into(), Value::String(text.to_string()));
    item
}

/// A complete comment.
pub fn raw_comment(name: &str, link_id: &str, body: &str) -> RawItem {
    raw(
        PostKind::Comment,
        json!({
            "name": name,
            "author": "test-author",
            "subreddit": "test_sub",
            "body": body,
            "score": 3,
            "created_utc": 1_600_000_100.0,
            "link_id": link_id,
        }),
    )
}

/// A gallery submission with the given ordered media addresses.
pub fn raw_gallery(name: &str, title: &str, urls: &[&str]) -> RawItem {
    let mut item = raw_submission(name, title, &format!("https://www.reddit.com/gallery/{}", name));
    let ids: Vec<String> = (0..urls.len()).map(|i| format!("m{}", i)).collect();
    let items: Vec<Value> = ids.iter().map(|id| json!({ "media_id": id })).collect();
    let mut metadata = Map::new();
    for (id, url) in ids.iter().zip(urls) {
        metadata.insert(id.clone(), json!({ "m": "image/jpg", "s": { "u": url } }));
    }
    item.data.insert("is_gallery".into(), Value::Bool(true));
    item.data.insert("gallery_data".into(), json!({ "items": items }));
    item.data.insert("media_metadata".into(), Value::Object(metadata));
    item
}

pub fn submission(id: &str) -> Submission {
    Submission {
        id: id.to_string(),
        title: "test title".to_string(),
        author: "test-author".to_string(),
        subreddit: "test_sub".to_string(),
        self_text: String::new(),
        url: "https://i.redd.it/test.jpg".to_string(),
        is_self: false,
        score: 0,
        created_utc: 1_600_000_000_000,
        first_found_utc: 0,
        nsfw: false,
        flair_text: None,
        processed: false,
        should_process: true,
        gallery: Vec::new(),
    }
}

pub fn comment(id: &str, parent: &str) -> Comment {
    Comment {
        id: id.to_string(),
        author: "test-author".to_string(),
        subreddit: "test_sub".to_string(),
        body: "test body".to_string(),
        score: 0,
        created_utc: 1_600_000_000_000,
        first_found_utc: 0,
        parent_submission_id: parent.to_string(),
        processed: false,
    }
}
