//! The deep harvest engine.
//!
//! Spill-first, connect later: starting from a seed track, the engine
//! crawls outward along every dimension the source exposes and persists
//! each record the moment it is seen. No relationships are derived here
//! beyond cheap inline playlist co-occurrence seeds; the heavy derivation
//! runs afterwards in [`crate::process`] against the dense cache.
//!
//! Seven phases, the last three toggleable:
//!
//! 1. User depth - everyone who liked or reposted the seed, plus their
//!    entire like-libraries
//! 2. Playlist depth - the artist's playlists with all member tracks
//! 3. Artist depth - the seed artist's discography via quoted search
//! 4. Semantic depth - fuzzy title search for remixes and covers
//! 5. Commentary depth - commenter crawl (unavailable upstream, no-op)
//! 6. Label depth - catalog crawl for labels detected in metadata
//! 7. Contextual depth - crawl of artists credited or mentioned in text
//!
//! Only the seed fetch is fatal. Every other fetch failure is logged,
//! counted, and skipped; a harvest always ends with whatever it managed
//! to collect.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::SqlitePool;

use super::extract;
use super::paginator::{self, PageSet, PAGE_SIZE};
use crate::config::HarvestConfig;
use crate::db;
use crate::error::Error;
use crate::model::{EngagementType, RelationType};
use crate::source::{adapter, GraphSource, SourceError, TrackData, UserData};

/// Search page size for contextual entity queries; these are noisy, so
/// the pages stay small.
const ENTITY_PAGE_SIZE: u32 = 20;
/// Result cap per contextual entity query.
const ENTITY_SEARCH_CAP: usize = 50;
/// Result cap per label catalog query.
const LABEL_CATALOG_CAP: usize = 200;
/// Labels crawled per seed.
const LABEL_LIMIT: usize = 3;
/// Key terms searched in the semantic phase.
const KEY_TERM_LIMIT: usize = 3;
/// Entities crawled per seed.
const ENTITY_LIMIT: usize = 10;

/// Counters for one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    pub tracks_collected: u64,
    pub users_collected: u64,
    pub playlists_collected: u64,
    pub artists_collected: u64,
    pub labels_detected: u64,
    pub entities_extracted: u64,
    pub api_requests: u64,
    /// Non-fatal fetch failures absorbed mid-phase
    pub sub_fetch_failures: u64,
}

/// Exhaustive crawler over a [`GraphSource`], writing into the cache.
pub struct HarvestEngine<'a, S> {
    source: &'a S,
    pool: &'a SqlitePool,
    config: HarvestConfig,
}

impl<'a, S: GraphSource> HarvestEngine<'a, S> {
    pub fn new(source: &'a S, pool: &'a SqlitePool, config: HarvestConfig) -> Self {
        Self {
            source,
            pool,
            config,
        }
    }

    /// Resolve a public URL to a track and harvest from it.
    ///
    /// # Errors
    ///
    /// Fails when the URL cannot be resolved or resolves to something
    /// other than a track. The seed is the one fetch with no fallback.
    pub async fn harvest_url(&self, url: &str) -> Result<HarvestStats, Error> {
        tracing::info!("resolving seed URL {url}");
        let stats = HarvestStats {
            api_requests: 1,
            ..HarvestStats::default()
        };
        let seed = self.source.resolve(url).await?.into_track()?;
        self.run_phases(seed, stats).await
    }

    /// Harvest from a track already present in the cache.
    ///
    /// # Errors
    ///
    /// Fails when the track is not cached or its stored payload cannot
    /// be parsed; the source has no direct track-by-id fetch.
    pub async fn harvest_cached(&self, track_id: i64) -> Result<HarvestStats, Error> {
        let row = db::get_track(self.pool, track_id).await?.ok_or_else(|| {
            Error::invalid_record(format!("seed track {track_id} is not in the cache"))
        })?;
        let raw = row.raw_json.ok_or_else(|| {
            Error::invalid_record(format!("seed track {track_id} has no stored payload"))
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| Error::invalid_record(format!("seed track {track_id}: {e}")))?;
        let seed = adapter::track_from_value(&value)?;
        self.run_phases(seed, HarvestStats::default()).await
    }

    async fn run_phases(
        &self,
        seed: TrackData,
        mut stats: HarvestStats,
    ) -> Result<HarvestStats, Error> {
        tracing::info!(
            seed = seed.id,
            title = %seed.title,
            "starting deep harvest"
        );
        self.cache_track_record(&seed, &mut stats).await?;

        self.harvest_user_depth(&seed, &mut stats).await?;
        self.harvest_playlist_depth(&seed, &mut stats).await?;
        self.harvest_artist_depth(&seed, &mut stats).await?;
        self.harvest_semantic_depth(&seed, &mut stats).await?;

        if self.config.enable_commentary_layer {
            self.harvest_commentary_depth(&seed, &mut stats);
        }
        if self.config.enable_label_layer {
            self.harvest_label_depth(&seed, &mut stats).await?;
        }
        if self.config.enable_contextual_layer {
            self.harvest_contextual_depth(&seed, &mut stats).await?;
        }

        tracing::info!(
            tracks = stats.tracks_collected,
            users = stats.users_collected,
            playlists = stats.playlists_collected,
            requests = stats.api_requests,
            failures = stats.sub_fetch_failures,
            "deep harvest complete"
        );
        Ok(stats)
    }

    /// Phase 1: everyone who engaged with the seed plus their libraries.
    async fn harvest_user_depth(
        &self,
        seed: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        let track_id = seed.id;
        tracing::info!("phase 1: user depth for track {track_id}");

        let likers = self
            .collect(
                stats,
                |offset| self.source.track_favoriters(track_id, PAGE_SIZE, offset),
                PAGE_SIZE, self.config.max_users_per_track,
            )
            .await;
        tracing::info!("{} users liked the seed", likers.items.len());

        let reposters = self
            .collect(
                stats,
                |offset| self.source.track_reposters(track_id, PAGE_SIZE, offset),
                PAGE_SIZE, self.config.max_users_per_track,
            )
            .await;
        tracing::info!("{} users reposted the seed", reposters.items.len());

        // dedupe across both listings, remembering how each user engaged
        let mut engagements: HashMap<i64, Vec<EngagementType>> = HashMap::new();
        let mut users: Vec<UserData> = Vec::new();
        for (user, kind) in likers
            .items
            .iter()
            .map(|u| (u, EngagementType::Like))
            .chain(reposters.items.iter().map(|u| (u, EngagementType::Repost)))
        {
            let entry = engagements.entry(user.id).or_insert_with(|| {
                users.push(user.clone());
                Vec::new()
            });
            if !entry.contains(&kind) {
                entry.push(kind);
            }
        }
        tracing::info!("{} unique engaged users", users.len());

        for (i, user) in users.iter().enumerate() {
            db::cache_user(self.pool, user).await?;
            stats.users_collected += 1;
            for &kind in &engagements[&user.id] {
                db::add_user_engagement(self.pool, user.id, track_id, kind, 1).await?;
            }

            if (i + 1) % 10 == 0 {
                tracing::info!("progress: {}/{} users processed", i + 1, users.len());
            }

            let user_id = user.id;
            let library = self
                .collect(
                    stats,
                    |offset| self.source.user_likes(user_id, PAGE_SIZE, offset),
                    PAGE_SIZE, self.config.max_tracks_per_user,
                )
                .await;
            tracing::debug!("user {user_id}: {} liked tracks", library.items.len());

            for liked in &library.items {
                self.cache_track_record(liked, stats).await?;
                db::add_user_engagement(self.pool, user_id, liked.id, EngagementType::Like, 1)
                    .await?;
            }
            self.delay().await;
        }

        tracing::info!(
            "user depth done: {} users, {} tracks so far",
            stats.users_collected,
            stats.tracks_collected
        );
        Ok(())
    }

    /// Phase 2: the artist's playlists and their member tracks.
    ///
    /// The source has no playlists-containing-track listing, so the
    /// artist's own playlists stand in as the reachable ecosystem.
    async fn harvest_playlist_depth(
        &self,
        seed: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        let Some(artist_id) = seed.artist_id() else {
            tracing::warn!("seed has no artist, skipping playlist depth");
            return Ok(());
        };
        tracing::info!("phase 2: playlist depth via artist {artist_id}");

        let playlists = self
            .collect(
                stats,
                |offset| self.source.user_playlists(artist_id, PAGE_SIZE, offset),
                PAGE_SIZE, self.config.max_playlists,
            )
            .await;

        for playlist in &playlists.items {
            db::cache_playlist(self.pool, playlist).await?;
            stats.playlists_collected += 1;

            // member tracks and bridge rows land in one transaction
            let written =
                db::cache_playlist_members(self.pool, playlist.id, &playlist.tracks).await?;
            stats.tracks_collected += written as u64;

            let member_ids: Vec<i64> = playlist.tracks.iter().map(|t| t.id).collect();
            self.seed_cooccurrence(&member_ids).await?;
        }

        tracing::info!("playlist depth done: {} playlists", playlists.items.len());
        Ok(())
    }

    /// Weak co-occurrence seeds for one playlist's members: every pair
    /// gets a symmetric edge weighted by 1/len, so big playlists count
    /// for less. The post-ingestion pass overwrites these with counted
    /// weights where the evidence is stronger.
    async fn seed_cooccurrence(&self, member_ids: &[i64]) -> Result<(), Error> {
        if member_ids.len() < 2 {
            return Ok(());
        }
        let weight = 1.0 / member_ids.len() as f64;
        for (i, &a) in member_ids.iter().enumerate() {
            for &b in &member_ids[i + 1..] {
                if a == b {
                    continue;
                }
                db::add_related_track(self.pool, a, b, &RelationType::CoPlaylist, weight).await?;
                db::add_related_track(self.pool, b, a, &RelationType::CoPlaylist, weight).await?;
            }
        }
        Ok(())
    }

    /// Phase 3: the seed artist's discography.
    ///
    /// There is no direct uploads listing, so this quotes the artist
    /// name into search and keeps only results actually uploaded by the
    /// same artist id.
    async fn harvest_artist_depth(
        &self,
        seed: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        let (Some(artist_id), Some(artist)) = (seed.artist_id(), seed.artist.as_ref()) else {
            tracing::warn!("seed has no artist, skipping artist depth");
            return Ok(());
        };
        tracing::info!("phase 3: discography for {}", artist.username);

        db::cache_user(self.pool, artist).await?;
        stats.artists_collected += 1;

        let query = format!("\"{}\"", artist.username);
        let results = self
            .collect(
                stats,
                |offset| self.source.search_tracks(&query, PAGE_SIZE, offset),
                PAGE_SIZE, self.config.max_artist_tracks,
            )
            .await;

        let mut confirmed = 0u64;
        for track in &results.items {
            if track.artist_id() == Some(artist_id) {
                self.cache_track_record(track, stats).await?;
                confirmed += 1;
            }
        }

        tracing::info!("artist depth done: {confirmed} confirmed discography tracks");
        Ok(())
    }

    /// Phase 4: fuzzy title matching for remixes, covers, and edits.
    async fn harvest_semantic_depth(
        &self,
        seed: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        if seed.title.is_empty() {
            return Ok(());
        }
        tracing::info!("phase 4: semantic depth for \"{}\"", seed.title);

        let terms = extract::key_terms(&seed.title);
        let mut kept = 0u64;
        for term in terms.iter().take(KEY_TERM_LIMIT) {
            let results = self
                .collect(
                    stats,
                    |offset| self.source.search_tracks(term, PAGE_SIZE, offset),
                    PAGE_SIZE, self.config.fuzzy_search_limit,
                )
                .await;

            for candidate in &results.items {
                let score = extract::string_similarity(&seed.title, &candidate.title);
                if score >= self.config.name_similarity_threshold {
                    self.cache_track_record(candidate, stats).await?;
                    kept += 1;
                }
            }
            self.delay().await;
        }

        tracing::info!("semantic depth done: {kept} similar-named tracks kept");
        Ok(())
    }

    /// Phase 5: commenter crawl. The source exposes no comment listing,
    /// so this records the skip and does nothing else.
    fn harvest_commentary_depth(&self, seed: &TrackData, _stats: &mut HarvestStats) {
        tracing::info!(
            seed = seed.id,
            "phase 5: comment listings are unavailable from this source, skipping"
        );
    }

    /// Phase 6: label catalogs detected from the seed's metadata.
    async fn harvest_label_depth(
        &self,
        seed: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        let description = seed.description.as_deref().unwrap_or("");
        let labels = extract::extract_labels(seed.label_name.as_deref(), description);
        if labels.is_empty() {
            tracing::info!("phase 6: no labels detected");
            return Ok(());
        }
        tracing::info!("phase 6: detected labels: {}", labels.join(", "));
        stats.labels_detected += labels.len() as u64;

        for label in labels.iter().take(LABEL_LIMIT) {
            tracing::info!("harvesting catalog for label {label}");
            let catalog = self
                .collect(
                    stats,
                    |offset| self.source.search_tracks(label, PAGE_SIZE, offset),
                    PAGE_SIZE, LABEL_CATALOG_CAP,
                )
                .await;

            let needle = label.to_lowercase();
            for track in &catalog.items {
                // search is fuzzy; keep only tracks actually on this label
                let on_label = track
                    .label_name
                    .as_deref()
                    .is_some_and(|l| l.to_lowercase().contains(&needle));
                if on_label {
                    self.cache_track_record(track, stats).await?;
                }
            }
            self.delay().await;
        }

        tracing::info!("label depth done: {} labels processed", labels.len().min(LABEL_LIMIT));
        Ok(())
    }

    /// Phase 7: artists credited or mentioned in the seed's text.
    async fn harvest_contextual_depth(
        &self,
        seed: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        let description = seed.description.as_deref().unwrap_or("");
        let entities = extract::extract_entities(&seed.title, description);
        if entities.is_empty() {
            tracing::info!("phase 7: no contextual entities found");
            return Ok(());
        }
        tracing::info!(
            "phase 7: extracted entities: {}",
            entities.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        );
        stats.entities_extracted += entities.len() as u64;

        for entity in entities.iter().take(ENTITY_LIMIT) {
            tracing::debug!("searching for entity {entity}");
            let results = self
                .collect(
                    stats,
                    |offset| self.source.search_tracks(entity, ENTITY_PAGE_SIZE, offset),
                    ENTITY_PAGE_SIZE, ENTITY_SEARCH_CAP,
                )
                .await;

            for track in &results.items {
                self.cache_track_record(track, stats).await?;
            }
            self.delay().await;
        }

        tracing::info!("contextual depth done: {} entities processed", entities.len());
        Ok(())
    }

    /// Run one pagination walk, folding its request count and any
    /// failure into the stats.
    async fn collect<'s, T, F>(
        &'s self,
        stats: &mut HarvestStats,
        fetch: F,
        page_size: u32,
        cap: usize,
    ) -> PageSet<T>
    where
        F: FnMut(u32) -> BoxFuture<'s, Result<Vec<T>, SourceError>>,
    {
        let set = paginator::fetch_all_pages(
            fetch,
            page_size,
            cap,
            Duration::from_millis(self.config.request_delay_ms),
        )
        .await;
        stats.api_requests += u64::from(set.requests);
        if let Some(ref err) = set.error {
            tracing::warn!("sub-fetch failed, keeping {} items: {err}", set.items.len());
            stats.sub_fetch_failures += 1;
        }
        set
    }

    /// Cache one track plus its artist, counting both.
    ///
    /// A row still inside the `cache_max_age_hours` freshness budget is
    /// counted but not rewritten, so a re-harvest refreshes edges
    /// without churning stored payloads.
    async fn cache_track_record(
        &self,
        track: &TrackData,
        stats: &mut HarvestStats,
    ) -> Result<(), Error> {
        let fresh =
            db::is_track_cached(self.pool, track.id, self.config.cache_max_age_hours).await?;
        if !fresh {
            db::cache_track(self.pool, track).await?;
        }
        stats.tracks_collected += 1;
        if let Some(artist) = &track.artist {
            db::cache_user(self.pool, artist).await?;
        }
        Ok(())
    }

    async fn delay(&self) {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;
    use crate::source::domain::ResolvedEntity;
    use crate::source::traits::mocks::{playlist, track, track_by, user, MockSource};

    fn quick_config() -> HarvestConfig {
        HarvestConfig {
            request_delay_ms: 0,
            ..HarvestConfig::default()
        }
    }

    fn seed_track() -> TrackData {
        track_by(1, "Night Drive", 9, "midnight_artist")
    }

    #[tokio::test]
    async fn test_harvest_url_rejects_non_track_seed() {
        let (_dir, pool) = test_db().await;
        let source = MockSource {
            resolved: Some(ResolvedEntity::User(user(9, "midnight_artist"))),
            ..Default::default()
        };
        let engine = HarvestEngine::new(&source, &pool, quick_config());

        let err = engine.harvest_url("https://example.com/someone").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::UnexpectedKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_harvest_url_unresolvable_seed_is_fatal() {
        let (_dir, pool) = test_db().await;
        let source = MockSource::default();
        let engine = HarvestEngine::new(&source, &pool, quick_config());

        let err = engine.harvest_url("https://example.com/gone").await.unwrap_err();
        assert!(matches!(err, Error::Source(SourceError::NotFound)));
    }

    #[tokio::test]
    async fn test_user_depth_collects_engagers_and_libraries() {
        let (_dir, pool) = test_db().await;
        let seed = seed_track();
        db::cache_track(&pool, &seed).await.unwrap();

        let mut source = MockSource::default();
        source.favoriters.insert(1, vec![user(10, "liker"), user(11, "both")]);
        source.reposters.insert(1, vec![user(11, "both")]);
        source.likes.insert(10, vec![track(2, "t2"), track(3, "t3")]);
        source.likes.insert(11, vec![track(2, "t2")]);

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_user_depth(&seed, &mut stats).await.unwrap();

        assert_eq!(stats.users_collected, 2);
        assert_eq!(stats.tracks_collected, 3);
        // one page walk each for likers, reposters, and two libraries
        assert_eq!(stats.api_requests, 4);
        assert_eq!(stats.sub_fetch_failures, 0);

        // user 11 engaged twice with the seed, once per type
        let engagers = db::get_track_engagers(&pool, 1, 10).await.unwrap();
        let both: Vec<_> = engagers.iter().filter(|e| e.user_id == 11).collect();
        assert_eq!(both.len(), 2);

        // shared liked track recorded an engagement row per user
        let liked_by_10 = db::get_user_liked_tracks(&pool, 10, 10).await.unwrap();
        assert_eq!(liked_by_10.len(), 3); // seed like + two library tracks
    }

    #[tokio::test]
    async fn test_fresh_cache_rows_are_not_rewritten() {
        let (_dir, pool) = test_db().await;
        db::cache_track(&pool, &track(2, "original title")).await.unwrap();

        let mut source = MockSource::default();
        source.favoriters.insert(1, vec![user(10, "liker")]);
        source.likes.insert(10, vec![track(2, "renamed title")]);

        // default 24h budget; the row written moments ago is fresh
        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_user_depth(&seed_track(), &mut stats).await.unwrap();

        // sighted and counted, but the stored payload is left alone
        assert_eq!(stats.tracks_collected, 1);
        let stored = db::get_track(&pool, 2).await.unwrap().unwrap();
        assert_eq!(stored.title, "original title");

        // the engagement edge still lands on the fresh row
        let liked = db::get_user_liked_tracks(&pool, 10, 10).await.unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].track_id, 2);
    }

    #[tokio::test]
    async fn test_playlist_depth_seeds_weak_cooccurrence() {
        let (_dir, pool) = test_db().await;
        let seed = seed_track();

        let mut source = MockSource::default();
        source.playlists.insert(
            9,
            vec![playlist(100, "Selections", 9, vec![track(2, "a"), track(3, "b")])],
        );

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_playlist_depth(&seed, &mut stats).await.unwrap();

        assert_eq!(stats.playlists_collected, 1);
        assert_eq!(stats.tracks_collected, 2);
        assert_eq!(db::get_playlist_track_ids(&pool, 100).await.unwrap(), vec![2, 3]);

        // two members share one playlist: weight 1/2, both directions
        let related = db::get_related_tracks(&pool, 2, Some(&RelationType::CoPlaylist), 0.0, 10)
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].track_id, 3);
        assert!((related[0].weight - 0.5).abs() < 1e-9);
        let reverse = db::get_related_tracks(&pool, 3, Some(&RelationType::CoPlaylist), 0.0, 10)
            .await
            .unwrap();
        assert_eq!(reverse[0].track_id, 2);
    }

    #[tokio::test]
    async fn test_artist_depth_filters_foreign_uploads() {
        let (_dir, pool) = test_db().await;
        let seed = seed_track();

        let source = MockSource {
            search_results: vec![
                track_by(5, "Another One", 9, "midnight_artist"),
                track_by(6, "Impostor", 77, "someone_else"),
            ],
            ..Default::default()
        };

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_artist_depth(&seed, &mut stats).await.unwrap();

        assert_eq!(stats.artists_collected, 1);
        assert_eq!(stats.tracks_collected, 1);
        assert!(db::get_track(&pool, 5).await.unwrap().is_some());
        assert!(db::get_track(&pool, 6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_semantic_depth_filters_by_title_similarity() {
        let (_dir, pool) = test_db().await;
        let seed = track_by(1, "night drive (remix)", 9, "midnight_artist");

        let source = MockSource {
            search_results: vec![
                track(20, "night drive remix"),
                track(21, "morning coffee"),
            ],
            ..Default::default()
        };

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_semantic_depth(&seed, &mut stats).await.unwrap();

        assert!(db::get_track(&pool, 20).await.unwrap().is_some());
        assert!(db::get_track(&pool, 21).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_label_depth_verifies_label_field() {
        let (_dir, pool) = test_db().await;
        let mut seed = seed_track();
        seed.label_name = Some("Glasshouse Records".to_string());

        let mut on_label = track(30, "catalog cut");
        on_label.label_name = Some("Glasshouse Records".to_string());
        let off_label = track(31, "unrelated hit");

        let source = MockSource {
            search_results: vec![on_label, off_label],
            ..Default::default()
        };

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_label_depth(&seed, &mut stats).await.unwrap();

        assert_eq!(stats.labels_detected, 1);
        assert!(db::get_track(&pool, 30).await.unwrap().is_some());
        assert!(db::get_track(&pool, 31).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contextual_depth_crawls_mentions() {
        let (_dir, pool) = test_db().await;
        let mut seed = seed_track();
        seed.description = Some("new one with @collab_kid".to_string());

        let source = MockSource {
            search_results: vec![track(40, "collab track")],
            ..Default::default()
        };

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        engine.harvest_contextual_depth(&seed, &mut stats).await.unwrap();

        assert_eq!(stats.entities_extracted, 1);
        assert!(db::get_track(&pool, 40).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sub_fetch_failures_are_absorbed() {
        let (_dir, pool) = test_db().await;
        let seed = seed_track();

        let source = MockSource {
            error: Some(SourceError::RateLimited),
            ..Default::default()
        };

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let mut stats = HarvestStats::default();
        // both engagement walks fail; the phase still completes
        engine.harvest_user_depth(&seed, &mut stats).await.unwrap();
        assert_eq!(stats.sub_fetch_failures, 2);
        assert_eq!(stats.users_collected, 0);
    }

    #[tokio::test]
    async fn test_full_harvest_from_url() {
        let (_dir, pool) = test_db().await;
        let source = MockSource {
            resolved: Some(ResolvedEntity::Track(seed_track())),
            ..Default::default()
        };

        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let stats = engine.harvest_url("https://example.com/track").await.unwrap();

        // the seed itself lands in the cache even with nothing reachable
        assert_eq!(stats.tracks_collected, 1);
        assert!(db::get_track(&pool, 1).await.unwrap().is_some());
        assert!(db::get_user(&pool, 9).await.unwrap().is_some());
        assert!(stats.api_requests >= 1);
    }

    #[tokio::test]
    async fn test_harvest_cached_requires_stored_payload() {
        let (_dir, pool) = test_db().await;
        let source = MockSource::default();
        let engine = HarvestEngine::new(&source, &pool, quick_config());

        let err = engine.harvest_cached(999).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_harvest_cached_replays_stored_seed() {
        let (_dir, pool) = test_db().await;
        db::cache_track(&pool, &seed_track()).await.unwrap();

        let source = MockSource::default();
        let engine = HarvestEngine::new(&source, &pool, quick_config());
        let stats = engine.harvest_cached(1).await.unwrap();
        assert_eq!(stats.tracks_collected, 1);
    }
}
