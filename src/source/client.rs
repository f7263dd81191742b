//! HTTP client for the remote graph source.
//!
//! Handles the two auth modes the platform accepts (OAuth bearer token in a
//! header, or a public client id as a query parameter), maps HTTP statuses
//! to typed errors, and retries transient failures with exponential backoff.
//! Token *refresh* is out of scope; an expired token surfaces as
//! [`SourceError::Unauthorized`].

use std::time::Duration;

use serde_json::Value;

use super::adapter;
use super::domain::{PlaylistData, ResolvedEntity, SourceError, TrackData, UserData};
use super::dto::ApiErrorDto;
use crate::config::SourceConfig;

/// User agent sent with every request; the platform requires one.
const USER_AGENT: &str = concat!("SoundGraph/", env!("CARGO_PKG_VERSION"));

/// Auth mode, decided once at construction.
#[derive(Debug, Clone)]
enum Auth {
    /// OAuth access token, sent as an Authorization header
    Bearer(String),
    /// Public client id, appended to every query string
    ClientId(String),
}

/// Remote graph source API client.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
    max_retries: u32,
}

impl ApiClient {
    /// Build a client from source configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] when neither an access token nor a
    /// client id is configured - this is fatal, not retried.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let auth = match (&config.access_token, &config.client_id) {
            (Some(token), _) if !token.is_empty() => Auth::Bearer(token.clone()),
            (_, Some(id)) if !id.is_empty() => Auth::ClientId(id.clone()),
            _ => {
                return Err(SourceError::Config(
                    "no access token and no client id set".to_string(),
                ));
            }
        };

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
            max_retries: config.max_retries,
        })
    }

    /// Create a client for testing with a custom base URL and no retries.
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into(),
            auth: Auth::ClientId("test-client".to_string()),
            max_retries: 0,
        }
    }

    /// Resolve a public URL to a kind-tagged entity.
    pub async fn resolve(&self, url: &str) -> Result<ResolvedEntity, SourceError> {
        let value = self
            .get_json("/resolve", &[("url", url.to_string())])
            .await?;
        adapter::resolved_from_value(&value)
    }

    /// Full-text track search.
    pub async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TrackData>, SourceError> {
        let (l, o) = page(limit, offset);
        let value = self
            .get_json("/tracks", &[("q", query.to_string()), l, o])
            .await?;
        adapter::tracks_from_value(&value)
    }

    /// Users who liked a track.
    pub async fn track_favoriters(
        &self,
        track_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserData>, SourceError> {
        let (l, o) = page(limit, offset);
        let value = self
            .get_json(&format!("/tracks/{track_id}/favoriters"), &[l, o])
            .await?;
        adapter::users_from_value(&value)
    }

    /// Users who reposted a track.
    pub async fn track_reposters(
        &self,
        track_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserData>, SourceError> {
        let (l, o) = page(limit, offset);
        let value = self
            .get_json(&format!("/tracks/{track_id}/reposters"), &[l, o])
            .await?;
        adapter::users_from_value(&value)
    }

    /// Tracks a user has liked.
    pub async fn user_likes(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TrackData>, SourceError> {
        let (l, o) = page(limit, offset);
        let value = self
            .get_json(&format!("/users/{user_id}/favorites"), &[l, o])
            .await?;
        adapter::tracks_from_value(&value)
    }

    /// A user's playlists, with member tracks embedded.
    pub async fn user_playlists(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistData>, SourceError> {
        let (l, o) = page(limit, offset);
        let value = self
            .get_json(&format!("/users/{user_id}/playlists"), &[l, o])
            .await?;
        adapter::playlists_from_value(&value)
    }

    /// Send a GET with auth applied, retrying transient failures.
    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, SourceError> {
        let mut attempt = 0u32;
        loop {
            match self.get_json_once(path, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = Duration::from_secs(2u64.saturating_pow(attempt).min(60));
                    tracing::warn!(
                        "transient error on {path} (attempt {}): {e}; retrying in {backoff:?}",
                        attempt + 1
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json_once(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, SourceError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut request = self.http.get(&url).query(params);
        match &self.auth {
            Auth::Bearer(token) => {
                request = request.bearer_auth(token);
            }
            Auth::ClientId(id) => {
                request = request.query(&[("client_id", id.as_str())]);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::Unauthorized(format!("HTTP {status} for {url}")));
        }
        if !status.is_success() {
            let message = match response.json::<ApiErrorDto>().await {
                Ok(body) => body.error.unwrap_or_else(|| "unknown error".to_string()),
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

fn page(limit: u32, offset: u32) -> ((&'static str, String), (&'static str, String)) {
    (("limit", limit.to_string()), ("offset", offset.to_string()))
}
