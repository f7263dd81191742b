//! Domain types for the remote graph source.
//!
//! These are the validated, defaulted records the rest of the crate works
//! with. Raw wire payloads only exist inside `dto.rs`/`adapter.rs`; by the
//! time data reaches here, every record has an id and every optional field
//! has been defaulted.

use serde_json::Value;

/// Errors from the remote graph source.
///
/// Transient failures (network, rate limit, 5xx) are retried inside the
/// client; callers only see an error once the retry budget is exhausted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Network-level failure (DNS, connect, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Remote returned 429 after retries
    #[error("rate limited by remote source")]
    RateLimited,

    /// Remote returned 401/403
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Remote returned 404
    #[error("resource not found")]
    NotFound,

    /// Any other non-success HTTP status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be parsed
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Record payload is missing its required id field
    #[error("record payload has no 'id' field")]
    MissingId,

    /// A resolve call returned a different entity kind than expected
    #[error("resolved to a '{found}', expected '{expected}'")]
    UnexpectedKind {
        expected: &'static str,
        found: String,
    },

    /// Missing credentials or other client misconfiguration
    #[error("source configuration error: {0}")]
    Config(String),
}

impl SourceError {
    /// Whether a retry inside the client could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A track record from the remote source.
#[derive(Debug, Clone)]
pub struct TrackData {
    pub id: i64,
    pub title: String,
    /// Uploader; artists are users on the remote platform
    pub artist: Option<UserData>,
    pub genre: Option<String>,
    pub tags: Vec<String>,
    pub duration_ms: Option<i64>,
    pub playback_count: i64,
    pub like_count: i64,
    pub repost_count: i64,
    pub permalink_url: Option<String>,
    pub description: Option<String>,
    pub label_name: Option<String>,
    /// Full wire payload, retained verbatim for the cache
    pub raw: Value,
}

impl TrackData {
    pub fn artist_id(&self) -> Option<i64> {
        self.artist.as_ref().map(|a| a.id)
    }

    pub fn artist_name(&self) -> Option<&str> {
        self.artist.as_ref().map(|a| a.username.as_str())
    }
}

/// A user record from the remote source.
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub permalink_url: Option<String>,
    pub followers_count: i64,
    pub raw: Value,
}

/// A playlist record, with whatever member tracks were embedded in the
/// payload (the remote source inlines them on the playlists endpoint).
#[derive(Debug, Clone)]
pub struct PlaylistData {
    pub id: i64,
    pub title: String,
    pub creator: Option<UserData>,
    pub track_count: i64,
    pub permalink_url: Option<String>,
    pub tracks: Vec<TrackData>,
    pub raw: Value,
}

impl PlaylistData {
    pub fn creator_id(&self) -> Option<i64> {
        self.creator.as_ref().map(|c| c.id)
    }
}

/// A kind-tagged entity returned by URL resolution.
#[derive(Debug, Clone)]
pub enum ResolvedEntity {
    Track(TrackData),
    User(UserData),
    Playlist(PlaylistData),
}

impl ResolvedEntity {
    /// Unwrap a track, erroring with the actual kind otherwise.
    pub fn into_track(self) -> Result<TrackData, SourceError> {
        match self {
            Self::Track(t) => Ok(t),
            Self::User(_) => Err(SourceError::UnexpectedKind {
                expected: "track",
                found: "user".to_string(),
            }),
            Self::Playlist(_) => Err(SourceError::UnexpectedKind {
                expected: "track",
                found: "playlist".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::Network("reset".into()).is_transient());
        assert!(SourceError::RateLimited.is_transient());
        assert!(
            SourceError::Api {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !SourceError::Api {
                status: 400,
                message: "bad request".into()
            }
            .is_transient()
        );
        assert!(!SourceError::MissingId.is_transient());
        assert!(!SourceError::NotFound.is_transient());
    }

    #[test]
    fn test_into_track_kind_mismatch() {
        let user = ResolvedEntity::User(UserData {
            id: 1,
            username: "dj".into(),
            permalink_url: None,
            followers_count: 0,
            raw: Value::Null,
        });
        let err = user.into_track().unwrap_err();
        assert!(matches!(
            err,
            SourceError::UnexpectedKind { expected: "track", .. }
        ));
    }
}
