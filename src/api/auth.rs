//! OAuth authentication utilities.

use chrono::Utc;
use reqwest::Client;

use crate::api::types::TokenResponse;
use crate::error::{Error, Result};

/// OAuth token endpoint.
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Seconds subtracted from the advertised lifetime before a token counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Credentials needed to obtain access tokens.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub user_agent: String,
}

/// A bearer token plus its expiry in epoch seconds.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: i64,
}

/// Check whether a token expiring at `expires_at` (epoch seconds) must be refreshed.
pub fn is_token_expired(expires_at: i64) -> bool {
    Utc::now().timestamp() + EXPIRY_MARGIN_SECS >= expires_at
}

/// Exchange the refresh token for a new access token.
pub async fn request_access_token(client: &Client, creds: &Credentials) -> Result<AccessToken> {
    if creds.refresh_token.is_empty() {
        return Err(Error::UpstreamAuth(
            "You need to authorize an account (refresh_token) before scanning".to_string(),
        ));
    }

    let response = client
        .post(TOKEN_URL)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", creds.refresh_token.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if status == 401 || status == 403 {
        return Err(Error::UpstreamAuth(format!(
            "HTTP {} from token endpoint",
            status
        )));
    }

    let text = response.text().await?;
    tracing::debug!("Token response status: {}", status);

    let parsed: TokenResponse = serde_json::from_str(&text)
        .map_err(|e| Error::Api(format!("Failed to parse token response: {}", e)))?;

    match (parsed.access_token, parsed.error) {
        (Some(token), None) => Ok(AccessToken {
            token,
            expires_at: Utc::now().timestamp() + parsed.expires_in,
        }),
        (_, Some(err)) => Err(Error::UpstreamAuth(format!(
            "Token endpoint rejected credentials: {}",
            err
        ))),
        (None, None) => Err(Error::UpstreamAuth(
            "Token endpoint returned no access token".to_string(),
        )),
    }
}
