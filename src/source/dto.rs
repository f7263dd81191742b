//! Remote API Data Transfer Objects.
//!
//! These types match what the platform API actually returns. Every field is
//! optional because the API omits fields freely depending on endpoint and
//! record age. DO NOT use these types outside the source module - convert to
//! domain types via the adapter.
//!
//! Payloads observed: track records (search, user favorites, playlist
//! members), user records (favoriters, reposters), playlist records with
//! embedded tracks, and the kind-tagged resolve response.

use serde::Deserialize;

/// Track payload.
///
/// The like counter appears as `likes_count` on newer payloads and
/// `favoritings_count` on older ones; the adapter takes the first non-null.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackDto {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub user: Option<UserDto>,
    pub genre: Option<String>,
    pub tag_list: Option<TagList>,
    /// Duration in milliseconds
    pub duration: Option<i64>,
    pub playback_count: Option<i64>,
    pub likes_count: Option<i64>,
    pub favoritings_count: Option<i64>,
    pub reposts_count: Option<i64>,
    pub permalink_url: Option<String>,
    pub description: Option<String>,
    pub label_name: Option<String>,
}

/// Tags arrive either as a single space-separated string or as an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    Text(String),
    List(Vec<String>),
}

impl TagList {
    /// Normalize to an ordered list of non-empty tag tokens.
    pub fn into_tags(self) -> Vec<String> {
        match self {
            Self::Text(s) => s
                .split_whitespace()
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            Self::List(v) => v.into_iter().filter(|t| !t.is_empty()).collect(),
        }
    }
}

/// User payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub permalink_url: Option<String>,
    pub followers_count: Option<i64>,
}

/// Playlist payload with embedded member tracks.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistDto {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub user: Option<UserDto>,
    pub track_count: Option<i64>,
    pub permalink_url: Option<String>,
    #[serde(default)]
    pub tracks: Vec<serde_json::Value>,
}

/// The resolve endpoint tags its response with a `kind`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedDto {
    pub kind: Option<String>,
}

/// Error body some endpoints return alongside a failure status.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDto {
    #[serde(alias = "error_message")]
    pub error: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs parse what the real API returns. If these fail,
// the API has changed and we need to update the DTOs.
// ============================================================================
