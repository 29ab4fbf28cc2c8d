//! Authenticated HTTP client for the chat backend
//!
//! Wraps reqwest::Client with identity-token injection and automatic refresh.

use anyhow::{bail, Context, Result};

use crate::auth::TokenStore;
use crate::config::Config;

/// Authenticated client for the realtime database, object storage, and
/// remote config endpoints.
pub struct ChatClient {
    http: reqwest::Client,
    config: Config,
}

impl ChatClient {
    /// Load config and build client. Attempts token refresh if the identity
    /// token is expired.
    pub async fn new() -> Result<Self> {
        let mut config = Config::load()?;

        let needs_refresh = config.get_id_token().map_or(true, |t| t.is_expired());
        if needs_refresh {
            if config.get_refresh_token().is_some() {
                tracing::info!("Identity token missing or expired, refreshing...");
                match crate::auth::signin::refresh().await {
                    Ok(true) => {
                        config = Config::load()?;
                        tracing::info!("Token refreshed");
                    }
                    Ok(false) => {
                        bail!("No refresh token available. Run 'friendly-cli login'.");
                    }
                    Err(e) => {
                        bail!("Token refresh failed: {:#}. Run 'friendly-cli login'.", e);
                    }
                }
            } else {
                bail!("Token expired and no refresh token. Run 'friendly-cli login'.");
            }
        }

        Ok(Self {
            http: reqwest::Client::new(),
            config,
        })
    }

    fn id_token(&self) -> Result<String> {
        let token = self
            .config
            .get_id_token()
            .context("No identity token. Run 'friendly-cli login' first.")?;
        if token.is_expired() {
            bail!("Identity token expired. Run 'friendly-cli login'.");
        }
        Ok(token.token)
    }

    /// Database URL for a collection path, with auth query parameter.
    fn db_url(&self, path: &str, extra_query: &str) -> Result<String> {
        let base = self.config.database_url()?.trim_end_matches('/');
        let token = self.id_token()?;
        let mut url = format!("{}/{}.json?auth={}", base, path, token);
        if !extra_query.is_empty() {
            url.push('&');
            url.push_str(extra_query);
        }
        Ok(url)
    }

    /// GET a database path as JSON.
    pub async fn db_get(&self, path: &str, query: &str) -> Result<reqwest::Response> {
        let url = self.db_url(path, query)?;
        tracing::debug!("DB GET {}", path);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("DB GET {} failed", path))?;

        check_response(resp, path).await
    }

    /// POST a new child document under a database path. The server assigns
    /// a time-ordered push key.
    pub async fn db_post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = self.db_url(path, "")?;
        tracing::debug!("DB POST {}", path);

        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("DB POST {} failed", path))?;

        check_response(resp, path).await
    }

    /// Open the change feed on a database path (`Accept: text/event-stream`).
    /// The returned response body is a long-lived SSE byte stream.
    pub async fn db_stream(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.db_url(path, "")?;
        tracing::debug!("DB STREAM {}", path);

        let resp = self
            .http
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .with_context(|| format!("DB stream {} failed", path))?;

        check_response(resp, path).await
    }

    /// POST raw bytes to the object storage upload endpoint.
    pub async fn storage_post(
        &self,
        url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let token = self.id_token()?;
        tracing::debug!("Storage POST {}", url);

        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Firebase {}", token))
            .header("Content-Type", content_type.to_string())
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Storage POST {} failed", url))?;

        check_response(resp, url).await
    }

    /// Display name of the signed-in user ("anonymous" fallback).
    pub fn username(&self) -> String {
        self.config.username()
    }

    /// UID of the signed-in user, if known.
    pub fn uid(&self) -> Option<String> {
        self.config.user.as_ref().map(|u| u.uid.clone())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        bail!(
            "401 Unauthorized for {}. Token may be invalid -- run 'friendly-cli login'.",
            what
        );
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("HTTP {} for {}: {}", status.as_u16(), what, body);
    }
    Ok(resp)
}
