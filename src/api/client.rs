//! Reddit OAuth API HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use tokio::sync::RwLock;

use crate::api::auth::{is_token_expired, request_access_token, AccessToken, Credentials};
use crate::api::types::*;
use crate::api::{ContentApi, Listing};
use crate::error::{Error, Result};

/// OAuth API base URL.
const API_BASE: &str = "https://oauth.reddit.com";

/// Largest page the listing endpoints accept.
pub const MAX_PAGE_SIZE: usize = 100;

/// Characters of an unparseable body kept in error messages.
const SNIPPET_CHARS: usize = 500;

/// Bearer token from `slot` if it is still valid.
fn cached_token(slot: &Option<AccessToken>) -> Option<String> {
    slot.as_ref()
        .filter(|t| !is_token_expired(t.expires_at))
        .map(|t| t.token.clone())
}

/// Leading part of a response body, cut on a character boundary.
fn body_snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Reddit API client with token refresh.
///
/// Cloning is cheap; clones share the HTTP pool and the cached token.
#[derive(Clone)]
pub struct RedditApi {
    client: Client,
    credentials: Credentials,
    token: Arc<RwLock<Option<AccessToken>>>,
    username: Arc<RwLock<Option<String>>>,
}

impl RedditApi {
    /// Create a client and authenticate immediately.
    ///
    /// Missing or rejected credentials surface as `Error::UpstreamAuth`.
    pub async fn authenticate(credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&credentials.user_agent)
            .build()
            .map_err(|e| Error::Api(format!("Failed to create HTTP client: {}", e)))?;

        let api = Self {
            client,
            credentials,
            token: Arc::new(RwLock::new(None)),
            username: Arc::new(RwLock::new(None)),
        };

        api.access_token().await?;
        Ok(api)
    }

    /// Return a valid bearer token, refreshing it when expired.
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = cached_token(&*self.token.read().await) {
            return Ok(token);
        }

        let mut slot = self.token.write().await;
        self.refresh_token(&mut slot).await
    }

    /// Refresh the token held in `slot` unless another caller already did
    /// while this one waited for the write lock.
    async fn refresh_token(&self, slot: &mut Option<AccessToken>) -> Result<String> {
        if let Some(token) = cached_token(slot) {
            return Ok(token);
        }
        let fresh = request_access_token(&self.client, &self.credentials).await?;
        let value = fresh.token.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    /// Make an authenticated GET request.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", API_BASE, path);
        let token = self.access_token().await?;

        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(&[("raw_json", "1")])
            .query(query)
            .header(header::AUTHORIZATION, format!("bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if status == 429 {
            let retry_after = response
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| v.ceil() as u64)
                .unwrap_or(60);
            return Err(Error::RateLimited(retry_after));
        }

        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Auth error response: {}", body);
            return Err(Error::UpstreamAuth(format!(
                "HTTP {}: {}",
                status,
                if body.is_empty() {
                    "Authentication failed"
                } else {
                    &body
                }
            )));
        }

        if !status.is_success() {
            return Err(Error::Api(format!("HTTP {} for {}", status, path)));
        }

        Ok(response)
    }

    /// Username of the authenticated account (cached after the first call).
    pub async fn username(&self) -> Result<String> {
        if let Some(name) = self.username.read().await.clone() {
            return Ok(name);
        }

        let response = self.get("/api/v1/me", &[]).await?;
        let text = response.text().await?;
        let info: AccountInfo = serde_json::from_str(&text).map_err(|e| {
            Error::Api(format!("Failed to parse account info: {} - Response: {}", e, text))
        })?;

        *self.username.write().await = Some(info.name.clone());
        Ok(info.name)
    }

    /// Fetch one page of the listing at `path`.
    async fn get_listing_page(
        &self,
        path: &str,
        params: &[(&str, String)],
        after: Option<&str>,
        page_size: usize,
    ) -> Result<ListingData> {
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("limit", page_size.min(MAX_PAGE_SIZE).to_string()));
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = self.get(path, &query).await?;
        let text = response.text().await?;
        tracing::debug!("Listing response length: {} bytes", text.len());

        let page: Thing<ListingData> = serde_json::from_str(&text).map_err(|e| {
            Error::Api(format!(
                "Failed to parse listing: {} - Response: {}",
                e,
                body_snippet(&text)
            ))
        })?;

        Ok(page.data)
    }

    /// Resolve a listing kind into an endpoint path plus fixed query params.
    async fn listing_endpoint(&self, kind: &ListingKind) -> Result<(String, Vec<(&'static str, String)>)> {
        match kind {
            ListingKind::Saved => {
                let user = self.username().await?;
                Ok((format!("/user/{}/saved", user), Vec::new()))
            }
            ListingKind::Upvoted => {
                let user = self.username().await?;
                Ok((format!("/user/{}/upvoted", user), Vec::new()))
            }
            ListingKind::Subreddit { name, sort, time } => {
                let name = name.trim_start_matches("/r/").trim_start_matches("r/");
                let mut params = Vec::new();
                if *sort == SubredditSort::Top {
                    params.push(("t", time.to_string()));
                }
                Ok((format!("/r/{}/{}", name, sort), params))
            }
        }
    }
}

#[async_trait]
impl ContentApi for RedditApi {
    async fn fetch_by_id(&self, id: &str) -> Result<RawItem> {
        let page = self
            .get_listing_page("/api/info", &[("id", id.to_string())], None, 1)
            .await?;

        let thing = page
            .children
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api(format!("Item not found: {}", id)))?;

        RawItem::from_thing(thing)
    }

    async fn start_listing(&self, kind: &ListingKind) -> Result<Box<dyn Listing>> {
        let (path, params) = self.listing_endpoint(kind).await?;
        Ok(Box::new(RedditListing {
            api: self.clone(),
            path,
            params,
            after: None,
            done: false,
        }))
    }
}

/// Listing cursor over one endpoint, following the `after` token.
struct RedditListing {
    api: RedditApi,
    path: String,
    params: Vec<(&'static str, String)>,
    after: Option<String>,
    done: bool,
}

#[async_trait]
impl Listing for RedditListing {
    async fn fetch_more(&mut self, page_size: usize) -> Result<Vec<RawItem>> {
        if self.done {
            return Ok(Vec::new());
        }

        let page = self
            .api
            .get_listing_page(&self.path, &self.params, self.after.as_deref(), page_size)
            .await?;

        self.after = page.after;
        if self.after.is_none() {
            self.done = true;
        }

        let mut items = Vec::with_capacity(page.children.len());
        for thing in page.children {
            match RawItem::from_thing(thing) {
                Ok(item) => items.push(item),
                Err(e) => tracing::debug!("Skipping listing entry: {}", e),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn api_with_token(token: Option<AccessToken>) -> RedditApi {
        RedditApi {
            client: Client::new(),
            credentials: Credentials::default(),
            token: Arc::new(RwLock::new(token)),
            username: Arc::new(RwLock::new(None)),
        }
    }

    #[test]
    fn test_body_snippet_respects_char_boundaries() {
        let body = format!("{}{}", "a".repeat(499), "é".repeat(10));
        let snippet = body_snippet(&body);
        assert_eq!(snippet.chars().count(), SNIPPET_CHARS);
        assert!(snippet.ends_with('é'));

        assert_eq!(body_snippet("short"), "short");
        let emoji = "🦀".repeat(600);
        assert_eq!(body_snippet(&emoji).chars().count(), SNIPPET_CHARS);
    }

    #[tokio::test]
    async fn test_refresh_keeps_token_renewed_by_another_caller() {
        let api = api_with_token(None);
        let mut slot = Some(AccessToken {
            token: "renewed".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
        });
        // No refresh token is configured, so a real refresh would fail.
        assert_eq!(api.refresh_token(&mut slot).await.unwrap(), "renewed");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let api = api_with_token(Some(AccessToken {
            token: "old".to_string(),
            expires_at: Utc::now().timestamp() - 10,
        }));
        let err = api.access_token().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamAuth(_)));
    }

    #[tokio::test]
    async fn test_valid_token_is_reused() {
        let api = api_with_token(Some(AccessToken {
            token: "current".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
        }));
        assert_eq!(api.access_token().await.unwrap(), "current");
    }
}
