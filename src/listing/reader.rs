//! Lazy, paginated reading of an upstream listing.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::{ContentApi, Listing, RawItem};
use crate::error::{Error, Result};
use crate::listing::resolve::resolve_post;
use crate::store::{Post, PostKind};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Cursor over a listing that yields resolved posts one at a time.
///
/// Holds at most one page in memory. The page is replaced when exhausted;
/// an empty page or reaching `limit` ends iteration. Not restartable.
pub struct ListingReader {
    api: Arc<dyn ContentApi>,
    listing: Box<dyn Listing>,
    page: VecDeque<RawItem>,
    page_size: usize,
    limit: usize,
    include_comments: bool,
    yielded: usize,
    skipped: usize,
    pages_fetched: usize,
    exhausted: bool,
}

impl ListingReader {
    /// Create a reader. A `limit` of 0 means unlimited.
    pub fn new(api: Arc<dyn ContentApi>, listing: Box<dyn Listing>, limit: usize) -> Self {
        Self {
            api,
            listing,
            page: VecDeque::new(),
            page_size: DEFAULT_PAGE_SIZE,
            limit,
            include_comments: true,
            yielded: 0,
            skipped: 0,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Drop comments before resolving them. Dropped items do not count toward `limit`.
    pub fn submissions_only(mut self) -> Self {
        self.include_comments = false;
        self
    }

    /// Number of posts yielded so far.
    pub fn count(&self) -> usize {
        self.yielded
    }

    /// Number of items skipped as incomplete.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn limit_reached(&self) -> bool {
        self.limit > 0 && self.yielded >= self.limit
    }

    /// Yield the next post, fetching a new page when the current one is used up.
    ///
    /// Incomplete items are logged and skipped. Every other error, including
    /// authentication failures, is returned unchanged.
    pub async fn next(&mut self) -> Result<Option<Post>> {
        loop {
            if self.limit_reached() {
                return Ok(None);
            }

            let raw = match self.page.pop_front() {
                Some(raw) => raw,
                None => {
                    if self.exhausted {
                        return Ok(None);
                    }
                    let page = self.listing.fetch_more(self.page_size).await?;
                    self.pages_fetched += 1;
                    if page.is_empty() {
                        self.exhausted = true;
                        return Ok(None);
                    }
                    self.page = page.into();
                    continue;
                }
            };

            if !self.include_comments && raw.kind == PostKind::Comment {
                continue;
            }

            match resolve_post(self.api.as_ref(), raw).await {
                Ok(post) => {
                    self.yielded += 1;
                    return Ok(Some(post));
                }
                Err(Error::IncompleteItem { id, field }) => {
                    tracing::warn!("Skipping incomplete item {} (missing '{}')", id, field);
                    self.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drain the reader into a vector.
    pub async fn collect(mut self) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        while let Some(post) = self.next().await? {
            posts.push(post);
        }
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ListingKind;
    use crate::test_support::{raw_comment, raw_submission, FixtureApi};

    fn numbered(n: usize) -> Vec<RawItem> {
        (0..n)
            .map(|i| raw_submission(&format!("t3_{}", i), "title", "https://i.redd.it/x.jpg"))
            .collect()
    }

    #[tokio::test]
    async fn test_reads_across_pages_until_empty() {
        let api = Arc::new(FixtureApi::new());
        api.set_listing(ListingKind::Saved, numbered(7));

        let listing = api.start_listing(&ListingKind::Saved).await.unwrap();
        let mut reader = ListingReader::new(api.clone(), listing, 0).with_page_size(3);

        let mut ids = Vec::new();
        while let Some(post) = reader.next().await.unwrap() {
            ids.push(post.id().to_string());
        }

        assert_eq!(ids.len(), 7);
        assert_eq!(ids[0], "t3_0");
        assert_eq!(ids[6], "t3_6");
        assert_eq!(reader.count(), 7);
        // 3 + 3 + 1, then the empty page that ends iteration.
        assert_eq!(reader.pages_fetched(), 4);
    }

    #[tokio::test]
    async fn test_limit_stops_early() {
        let api = Arc::new(FixtureApi::new());
        api.set_listing(ListingKind::Upvoted, numbered(20));

        let listing = api.start_listing(&ListingKind::Upvoted).await.unwrap();
        let reader = ListingReader::new(api.clone(), listing, 5).with_page_size(4);
        assert_eq!(reader.collect().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_incomplete_items_are_skipped() {
        let api = Arc::new(FixtureApi::new());
        let mut broken = raw_submission("t3_broken", "t", "https://x.example/a.png");
        broken.data.remove("title");
        api.set_listing(
            ListingKind::Saved,
            vec![broken, raw_submission("t3_ok", "t", "https://x.example/b.png")],
        );

        let listing = api.start_listing(&ListingKind::Saved).await.unwrap();
        let mut reader = ListingReader::new(api.clone(), listing, 0);
        let first = reader.next().await.unwrap().unwrap();
        assert_eq!(first.id(), "t3_ok");
        assert!(reader.next().await.unwrap().is_none());
        assert_eq!(reader.skipped(), 1);
    }

    #[tokio::test]
    async fn test_submissions_only_drops_comments() {
        let api = Arc::new(FixtureApi::new());
        api.set_listing(
            ListingKind::Saved,
            vec![
                raw_comment("t1_a", "t3_p", "body"),
                raw_submission("t3_b", "t", "https://x.example/b.png"),
            ],
        );

        let listing = api.start_listing(&ListingKind::Saved).await.unwrap();
        let posts = ListingReader::new(api.clone(), listing, 1)
            .submissions_only()
            .collect()
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].kind(), PostKind::Submission);
    }

    #[tokio::test]
    async fn test_upstream_errors_propagate() {
        let api = Arc::new(FixtureApi::new());
        api.fail_pages_with_auth_error();
        api.set_listing(ListingKind::Saved, numbered(2));

        let listing = api.start_listing(&ListingKind::Saved).await.unwrap();
        let mut reader = ListingReader::new(api.clone(), listing, 0);
        assert!(matches!(reader.next().await, Err(Error::UpstreamAuth(_))));
    }
}
