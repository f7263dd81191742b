//! Trait definition for the remote graph source.
//!
//! The harvest engine talks to the platform through this trait so tests can
//! substitute an in-memory implementation with scripted pages and failures.
//! Production code uses [`ApiClient`](super::client::ApiClient).

use async_trait::async_trait;

use super::client::ApiClient;
use super::domain::{PlaylistData, ResolvedEntity, SourceError, TrackData, UserData};

/// Remote social graph source.
///
/// All list endpoints take `limit`/`offset` and return at most `limit`
/// records; a short or empty page means the listing is exhausted.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Resolve a public URL to whatever entity it points at.
    async fn resolve(&self, url: &str) -> Result<ResolvedEntity, SourceError>;

    /// Full-text track search.
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TrackData>, SourceError>;

    /// Users who liked the track.
    async fn track_favoriters(
        &self,
        track_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserData>, SourceError>;

    /// Users who reposted the track.
    async fn track_reposters(
        &self,
        track_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserData>, SourceError>;

    /// Tracks the user has liked.
    async fn user_likes(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TrackData>, SourceError>;

    /// The user's playlists, member tracks embedded.
    async fn user_playlists(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistData>, SourceError>;
}

#[async_trait]
impl GraphSource for ApiClient {
    async fn resolve(&self, url: &str) -> Result<ResolvedEntity, SourceError> {
        self.resolve(url).await
    }

    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TrackData>, SourceError> {
        self.search_tracks(query, limit, offset).await
    }

    async fn track_favoriters(
        &self,
        track_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserData>, SourceError> {
        self.track_favoriters(track_id, limit, offset).await
    }

    async fn track_reposters(
        &self,
        track_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserData>, SourceError> {
        self.track_reposters(track_id, limit, offset).await
    }

    async fn user_likes(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TrackData>, SourceError> {
        self.user_likes(user_id, limit, offset).await
    }

    async fn user_playlists(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistData>, SourceError> {
        self.user_playlists(user_id, limit, offset).await
    }
}

/// In-memory source for testing.
#[cfg(test)]
pub mod mocks {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;

    /// Mock source serving scripted data with real limit/offset paging.
    #[derive(Default)]
    pub struct MockSource {
        pub resolved: Option<ResolvedEntity>,
        pub search_results: Vec<TrackData>,
        pub favoriters: HashMap<i64, Vec<UserData>>,
        pub reposters: HashMap<i64, Vec<UserData>>,
        pub likes: HashMap<i64, Vec<TrackData>>,
        pub playlists: HashMap<i64, Vec<PlaylistData>>,
        /// Error returned by every list endpoint when set.
        pub error: Option<SourceError>,
        /// Total calls across all endpoints.
        pub calls: AtomicU32,
    }

    impl MockSource {
        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn slice<T: Clone>(&self, all: &[T], limit: u32, offset: u32) -> Result<Vec<T>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref err) = self.error {
                return Err(err.clone());
            }
            let start = (offset as usize).min(all.len());
            let end = (start + limit as usize).min(all.len());
            Ok(all[start..end].to_vec())
        }
    }

    /// Build a minimal track record for tests.
    pub fn track(id: i64, title: &str) -> TrackData {
        TrackData {
            id,
            title: title.to_string(),
            artist: None,
            genre: None,
            tags: vec![],
            duration_ms: Some(180_000),
            playback_count: 0,
            like_count: 0,
            repost_count: 0,
            permalink_url: None,
            description: None,
            label_name: None,
            raw: json!({"id": id, "title": title}),
        }
    }

    /// Build a track with an attached artist.
    pub fn track_by(id: i64, title: &str, artist_id: i64, artist_name: &str) -> TrackData {
        TrackData {
            artist: Some(user(artist_id, artist_name)),
            ..track(id, title)
        }
    }

    /// Build a minimal user record for tests.
    pub fn user(id: i64, username: &str) -> UserData {
        UserData {
            id,
            username: username.to_string(),
            permalink_url: None,
            followers_count: 0,
            raw: json!({"id": id, "username": username}),
        }
    }

    /// Build a playlist with the given member tracks.
    pub fn playlist(id: i64, title: &str, creator_id: i64, tracks: Vec<TrackData>) -> PlaylistData {
        PlaylistData {
            id,
            title: title.to_string(),
            creator: Some(user(creator_id, &format!("creator{creator_id}"))),
            track_count: tracks.len() as i64,
            permalink_url: None,
            tracks,
            raw: json!({"id": id, "title": title}),
        }
    }

    #[async_trait]
    impl GraphSource for MockSource {
        async fn resolve(&self, _url: &str) -> Result<ResolvedEntity, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.resolved.clone().ok_or(SourceError::NotFound)
        }

        async fn search_tracks(
            &self,
            _query: &str,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<TrackData>, SourceError> {
            self.slice(&self.search_results, limit, offset)
        }

        async fn track_favoriters(
            &self,
            track_id: i64,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<UserData>, SourceError> {
            let all = self.favoriters.get(&track_id).cloned().unwrap_or_default();
            self.slice(&all, limit, offset)
        }

        async fn track_reposters(
            &self,
            track_id: i64,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<UserData>, SourceError> {
            let all = self.reposters.get(&track_id).cloned().unwrap_or_default();
            self.slice(&all, limit, offset)
        }

        async fn user_likes(
            &self,
            user_id: i64,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<TrackData>, SourceError> {
            let all = self.likes.get(&user_id).cloned().unwrap_or_default();
            self.slice(&all, limit, offset)
        }

        async fn user_playlists(
            &self,
            user_id: i64,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<PlaylistData>, SourceError> {
            let all = self.playlists.get(&user_id).cloned().unwrap_or_default();
            self.slice(&all, limit, offset)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_pages_by_offset() {
            let mut source = MockSource::default();
            source
                .likes
                .insert(7, (0..5).map(|i| track(i, &format!("t{i}"))).collect());

            let first = source.user_likes(7, 2, 0).await.unwrap();
            assert_eq!(first.len(), 2);
            assert_eq!(first[0].id, 0);

            let last = source.user_likes(7, 2, 4).await.unwrap();
            assert_eq!(last.len(), 1);
            assert_eq!(last[0].id, 4);

            let past_end = source.user_likes(7, 2, 10).await.unwrap();
            assert!(past_end.is_empty());
            assert_eq!(source.call_count(), 3);
        }

        #[tokio::test]
        async fn test_mock_error_injection() {
            let source = MockSource {
                error: Some(SourceError::RateLimited),
                ..Default::default()
            };
            let result = source.user_likes(1, 50, 0).await;
            assert!(matches!(result, Err(SourceError::RateLimited)));
        }

        #[tokio::test]
        async fn test_mock_resolve_defaults_to_not_found() {
            let source = MockSource::default();
            assert!(matches!(
                source.resolve("https://example.com/x").await,
                Err(SourceError::NotFound)
            ));
        }
    }
}
