//! Post-ingestion relationship builder.
//!
//! Runs after a harvest has filled the cache and derives the relationship
//! layers from the raw engagement and membership data: user-user Jaccard
//! similarity over liked tracks, track-track playlist co-occurrence, and
//! artist-artist co-library affinity. Nothing here touches the network;
//! the passes read the cache and write relationship rows back into it, so
//! they can be re-run any time the thresholds change.

use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;

use crate::config::ProcessingConfig;
use crate::db;
use crate::model::RelationType;

/// Ceiling on liked tracks loaded per user for the similarity pass.
const LIKES_PER_USER_LIMIT: i64 = 10_000;

/// Row counts produced by one processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStats {
    /// Jaccard similarity pairs written
    pub user_similarities: u64,
    /// Co-occurrence edges written (directed count, two per pair)
    pub track_relationships: u64,
    /// Artist affinity pairs written
    pub artist_relationships: u64,
}

/// Derives relationship layers from harvested data.
pub struct PostIngestionProcessor<'a> {
    pool: &'a SqlitePool,
    config: ProcessingConfig,
}

impl<'a> PostIngestionProcessor<'a> {
    pub fn new(pool: &'a SqlitePool, config: ProcessingConfig) -> Self {
        Self { pool, config }
    }

    /// Run all derivation passes in order.
    pub async fn process_all(&self) -> Result<ProcessStats, sqlx::Error> {
        let cache = db::get_cache_stats(self.pool).await?;
        tracing::info!(
            tracks = cache.tracks,
            users = cache.users,
            playlists = cache.playlists,
            engagements = cache.user_engagements,
            "starting post-ingestion processing"
        );

        let stats = ProcessStats {
            user_similarities: self.compute_user_similarities().await?,
            track_relationships: self.compute_track_cooccurrence().await?,
            artist_relationships: self.compute_artist_relationships().await?,
        };

        tracing::info!(
            user_similarities = stats.user_similarities,
            track_relationships = stats.track_relationships,
            artist_relationships = stats.artist_relationships,
            "post-ingestion processing complete"
        );
        Ok(stats)
    }

    /// Pass 1: Jaccard similarity over each pair of users' liked tracks.
    ///
    /// Like-sets are loaded once per user up front; the pair loop is
    /// O(users^2) over in-memory sets. A pair is written when the
    /// intersection reaches `min_common_tracks` and the score reaches
    /// `min_similarity_score`.
    pub async fn compute_user_similarities(&self) -> Result<u64, sqlx::Error> {
        let user_ids = db::get_engaged_user_ids(self.pool).await?;
        tracing::info!("computing similarities across {} users", user_ids.len());

        let mut like_sets: HashMap<i64, HashSet<i64>> = HashMap::with_capacity(user_ids.len());
        for &user_id in &user_ids {
            let likes = db::get_user_liked_tracks(self.pool, user_id, LIKES_PER_USER_LIMIT).await?;
            like_sets.insert(user_id, likes.into_iter().map(|t| t.track_id).collect());
        }

        let min_common = self.config.min_common_tracks;
        let mut written = 0u64;
        for (i, &user_a) in user_ids.iter().enumerate() {
            let set_a = &like_sets[&user_a];
            if set_a.len() < min_common {
                continue;
            }
            for &user_b in &user_ids[i + 1..] {
                let set_b = &like_sets[&user_b];
                if set_b.len() < min_common {
                    continue;
                }

                let common = set_a.intersection(set_b).count();
                if common < min_common {
                    continue;
                }
                let union = set_a.len() + set_b.len() - common;
                let jaccard = common as f64 / union as f64;
                if jaccard < self.config.min_similarity_score {
                    continue;
                }

                db::add_user_similarity(
                    self.pool,
                    user_a,
                    user_b,
                    &RelationType::JaccardLikes,
                    jaccard,
                    common as i64,
                    set_a.len() as i64,
                    set_b.len() as i64,
                )
                .await?;
                written += 1;
            }
        }

        tracing::info!("wrote {written} user similarity pairs");
        Ok(written)
    }

    /// Pass 2: track co-occurrence across playlist memberships.
    ///
    /// A pair of tracks sharing at least `min_co_occurrence` playlists
    /// gets a symmetric `co_playlist` edge (two directed rows) with
    /// weight `min(1, count / 10)`.
    pub async fn compute_track_cooccurrence(&self) -> Result<u64, sqlx::Error> {
        let playlist_ids = db::get_playlist_ids(self.pool).await?;
        tracing::info!("computing co-occurrence from {} playlists", playlist_ids.len());

        let mut pair_counts: HashMap<(i64, i64), u32> = HashMap::new();
        for playlist_id in playlist_ids {
            let members = db::get_playlist_track_ids(self.pool, playlist_id).await?;
            for (i, &track_a) in members.iter().enumerate() {
                for &track_b in &members[i + 1..] {
                    if track_a == track_b {
                        continue;
                    }
                    let key = if track_a < track_b {
                        (track_a, track_b)
                    } else {
                        (track_b, track_a)
                    };
                    *pair_counts.entry(key).or_default() += 1;
                }
            }
        }

        let mut written = 0u64;
        for ((track_a, track_b), count) in pair_counts {
            if (count as usize) < self.config.min_co_occurrence {
                continue;
            }
            let weight = (count as f64 / 10.0).min(1.0);
            db::add_related_track(self.pool, track_a, track_b, &RelationType::CoPlaylist, weight)
                .await?;
            db::add_related_track(self.pool, track_b, track_a, &RelationType::CoPlaylist, weight)
                .await?;
            written += 2;
        }

        tracing::info!("wrote {written} co-occurrence edges");
        Ok(written)
    }

    /// Pass 3: artist affinity from co-presence in user like-libraries.
    ///
    /// Two artists liked by at least two shared users get a `co_library`
    /// row with strength `min(1, count / 20)`, gated by
    /// `min_artist_strength`. The shared-user count is kept as evidence.
    pub async fn compute_artist_relationships(&self) -> Result<u64, sqlx::Error> {
        let pairs = db::get_user_artist_pairs(self.pool).await?;

        let mut user_artists: HashMap<i64, HashSet<i64>> = HashMap::new();
        for (user_id, artist_id) in pairs {
            user_artists.entry(user_id).or_default().insert(artist_id);
        }
        tracing::info!("analyzing {} user libraries", user_artists.len());

        let mut pair_counts: HashMap<(i64, i64), u32> = HashMap::new();
        for artists in user_artists.values() {
            let mut sorted: Vec<i64> = artists.iter().copied().collect();
            sorted.sort_unstable();
            for (i, &artist_a) in sorted.iter().enumerate() {
                for &artist_b in &sorted[i + 1..] {
                    *pair_counts.entry((artist_a, artist_b)).or_default() += 1;
                }
            }
        }

        let metadata = serde_json::json!({"source": "user_libraries"});
        let mut written = 0u64;
        for ((artist_a, artist_b), count) in pair_counts {
            // at least two users must hold both artists
            if count < 2 {
                continue;
            }
            let strength = (count as f64 / 20.0).min(1.0);
            if strength < self.config.min_artist_strength {
                continue;
            }
            db::add_artist_relationship(
                self.pool,
                artist_a,
                artist_b,
                &RelationType::CoLibrary,
                strength,
                count as i64,
                Some(&metadata),
            )
            .await?;
            written += 1;
        }

        tracing::info!("wrote {written} artist relationship pairs");
        Ok(written)
    }
}
