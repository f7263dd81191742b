//! Core data models for the harvested social graph.
//!
//! Defines the cached entities ([`Track`], [`User`], [`Playlist`]) and the
//! four relationship layers stored alongside them. These are derived from
//! SQLx for database mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `tracks`, `users`, `playlists` - harvested entities
//! - `playlist_tracks` - playlist membership bridge
//! - `related_tracks` - Layer 1 (track-track)
//! - `user_engagements` - Layer 2 (user-track)
//! - `user_similarities`, `user_follows` - Layer 3 (user-user)
//! - `artist_relationships` - Layer 4 (artist-artist)

use sqlx::FromRow;

/// A cached track from the remote platform.
///
/// `track_id` is the remote-assigned id; counts and the raw payload are
/// overwritten wholesale on re-sighting (last-write-wins).
#[derive(Debug, Clone, FromRow)]
pub struct Track {
    /// Remote track id (primary key)
    pub track_id: i64,
    /// Track title
    pub title: String,
    /// Uploader/artist user id (weak reference to `users`)
    pub artist_id: Option<i64>,
    /// Uploader username, denormalized for display
    pub artist_name: Option<String>,
    /// Genre label
    pub genre: Option<String>,
    /// JSON array of tag strings (see [`Track::tag_list`])
    pub tags: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: Option<i64>,
    /// Play count at last sighting
    pub playback_count: i64,
    /// Like count at last sighting
    pub like_count: i64,
    /// Repost count at last sighting
    pub repost_count: i64,
    /// Public permalink URL
    pub permalink_url: Option<String>,
    /// Full raw API payload, retained for replay/debugging
    pub raw_json: Option<String>,
    /// First-sighting timestamp (UTC, `YYYY-MM-DD HH:MM:SS`)
    pub cached_at: String,
    /// Last-refresh timestamp
    pub updated_at: String,
}

impl Track {
    /// Parse the stored JSON tag array. Malformed/absent tags yield an
    /// empty list rather than an error.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .and_then(|t| serde_json::from_str(t).ok())
            .unwrap_or_default()
    }
}

/// A cached user (listeners and artists share this table).
#[derive(Debug, Clone, FromRow)]
pub struct User {
    /// Remote user id
    pub user_id: i64,
    /// Username
    pub username: String,
    /// Public permalink URL
    pub permalink_url: Option<String>,
    /// Follower count at last sighting
    pub followers_count: i64,
    /// Full raw API payload
    pub raw_json: Option<String>,
    /// First-sighting timestamp
    pub cached_at: String,
}

/// A cached playlist.
#[derive(Debug, Clone, FromRow)]
pub struct Playlist {
    /// Remote playlist id
    pub playlist_id: i64,
    /// Playlist title
    pub title: String,
    /// Creator user id (weak reference)
    pub creator_user_id: Option<i64>,
    /// Declared track count (may exceed the members we cached)
    pub track_count: i64,
    /// Public permalink URL
    pub permalink_url: Option<String>,
    /// Full raw API payload
    pub raw_json: Option<String>,
    /// First-sighting timestamp
    pub cached_at: String,
}

/// A Layer-1 related-track row joined with the destination track's metadata.
#[derive(Debug, Clone, FromRow)]
pub struct RelatedTrack {
    /// Destination track id
    pub track_id: i64,
    /// Destination track title
    pub title: String,
    /// Destination track's artist id
    pub artist_id: Option<i64>,
    /// Destination track's artist name
    pub artist_name: Option<String>,
    /// Relation vocabulary, e.g. `co_playlist` (see [`RelationType`])
    pub relation_type: String,
    /// Relation strength; semantics are relation-type-specific
    pub weight: f64,
}

/// A Layer-2 engagement row joined with the engaging user's metadata.
#[derive(Debug, Clone, FromRow)]
pub struct TrackEngager {
    /// Engaging user id
    pub user_id: i64,
    /// Username
    pub username: String,
    /// Follower count
    pub followers_count: i64,
    /// `like` / `repost` / `play`
    pub engagement_type: String,
    /// Accumulated engagement count
    pub engagement_count: i64,
}

/// A track a user has liked (Layer-2 read path).
#[derive(Debug, Clone, FromRow)]
pub struct LikedTrack {
    /// Track id
    pub track_id: i64,
    /// Track title
    pub title: String,
    /// Track's artist id
    pub artist_id: Option<i64>,
}

/// A Layer-3 similarity row, oriented from the queried user outward.
#[derive(Debug, Clone, FromRow)]
pub struct SimilarUser {
    /// The other user in the pair
    pub similar_user_id: i64,
    /// Similarity vocabulary, e.g. `jaccard_likes`
    pub similarity_type: String,
    /// Jaccard score in [0, 1]
    pub similarity_score: f64,
    /// Size of the liked-track intersection
    pub common_tracks: i64,
}

/// A Layer-4 relationship row, oriented from the queried artist outward.
#[derive(Debug, Clone, FromRow)]
pub struct RelatedArtist {
    /// The other artist in the pair
    pub related_artist_id: i64,
    /// Username of the other artist, if cached
    pub artist_name: Option<String>,
    /// Relationship vocabulary, e.g. `co_library`
    pub relationship_type: String,
    /// Relationship strength in [0, 1]
    pub strength: f64,
    /// Number of independent observations supporting the row
    pub evidence_count: i64,
}

/// Per-table row counts, for CLI reporting.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub tracks: i64,
    pub users: i64,
    pub playlists: i64,
    pub playlist_tracks: i64,
    pub related_tracks: i64,
    pub user_engagements: i64,
    pub user_similarities: i64,
    pub user_follows: i64,
    pub artist_relationships: i64,
}

/// Closed vocabulary for Layer-2 engagement rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngagementType {
    Like,
    Repost,
    Play,
}

impl EngagementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Repost => "repost",
            Self::Play => "play",
        }
    }
}

impl std::fmt::Display for EngagementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabulary for relationship rows across layers, with an escape
/// hatch for relation types recorded by older harvests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationType {
    /// Layer 1: co-occurrence in a playlist
    CoPlaylist,
    /// Layer 3: Jaccard similarity over liked tracks
    JaccardLikes,
    /// Layer 3: follow edge
    Follow,
    /// Layer 4: explicit collaboration
    Collaboration,
    /// Layer 4: co-occurrence in user like-libraries
    CoLibrary,
    /// Forward-compatible unknown relation
    Other(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CoPlaylist => "co_playlist",
            Self::JaccardLikes => "jaccard_likes",
            Self::Follow => "follow",
            Self::Collaboration => "collaboration",
            Self::CoLibrary => "co_library",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "co_playlist" => Self::CoPlaylist,
            "jaccard_likes" => Self::JaccardLikes,
            "follow" => Self::Follow,
            "collaboration" => Self::Collaboration,
            "co_library" => Self::CoLibrary,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
