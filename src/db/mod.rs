//! Entity cache for harvested social graph data.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. The harvest
//! engine writes entities the moment it sees them; the post-ingestion
//! processor and graph builder read everything back from here, so the
//! cache is the only interface between collection and derivation.
//!
//! All writes are idempotent upserts keyed on remote ids. Pair tables
//! (`user_similarities`, `artist_relationships`) are normalized to
//! `id_a < id_b` inside this module; callers may pass endpoints in either
//! order.
//!
//! # Example
//!
//! ```ignore
//! use soundgraph::db::{init_db, get_related_tracks};
//!
//! let pool = init_db("sqlite:soundgraph.db").await?;
//! let related = get_related_tracks(&pool, 42, None, 0.0, 20).await?;
//! ```

use chrono::{NaiveDateTime, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{
    CacheStats, EngagementType, LikedTrack, Playlist, RelatedArtist, RelatedTrack, RelationType,
    SimilarUser, Track, TrackEngager, User,
};
use crate::source::{PlaylistData, TrackData, UserData};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "soundgraph.db";

/// Timestamp format used by SQLite's CURRENT_TIMESTAMP.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Track upsert shared by the single and playlist-member write paths;
/// runs against whatever executor the caller is holding.
async fn upsert_track<'e, E>(executor: E, track: &TrackData) -> sqlx::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let tags = serde_json::to_string(&track.tags).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        r#"
        INSERT INTO tracks (
            track_id, title, artist_id, artist_name, genre, tags, duration_ms,
            playback_count, like_count, repost_count, permalink_url, raw_json
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(track_id) DO UPDATE SET
            title = excluded.title,
            artist_id = excluded.artist_id,
            artist_name = excluded.artist_name,
            genre = excluded.genre,
            tags = excluded.tags,
            duration_ms = excluded.duration_ms,
            playback_count = excluded.playback_count,
            like_count = excluded.like_count,
            repost_count = excluded.repost_count,
            permalink_url = excluded.permalink_url,
            raw_json = excluded.raw_json,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(track.id)
    .bind(&track.title)
    .bind(track.artist_id())
    .bind(track.artist_name())
    .bind(&track.genre)
    .bind(tags)
    .bind(track.duration_ms)
    .bind(track.playback_count)
    .bind(track.like_count)
    .bind(track.repost_count)
    .bind(&track.permalink_url)
    .bind(track.raw.to_string())
    .execute(executor)
    .await?;
    Ok(())
}

async fn upsert_user<'e, E>(executor: E, user: &UserData) -> sqlx::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO users (user_id, username, permalink_url, followers_count, raw_json)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            username = excluded.username,
            permalink_url = excluded.permalink_url,
            followers_count = excluded.followers_count,
            raw_json = excluded.raw_json
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.permalink_url)
    .bind(user.followers_count)
    .bind(user.raw.to_string())
    .execute(executor)
    .await?;
    Ok(())
}

/// Insert or refresh a track.
///
/// On conflict the extracted columns, counts, and raw payload are
/// overwritten and `updated_at` is bumped; `cached_at` keeps the
/// first-sighting timestamp.
pub async fn cache_track(pool: &SqlitePool, track: &TrackData) -> sqlx::Result<()> {
    upsert_track(pool, track).await
}

/// Insert or refresh a user.
pub async fn cache_user(pool: &SqlitePool, user: &UserData) -> sqlx::Result<()> {
    upsert_user(pool, user).await
}

/// Insert or refresh a playlist header (membership is stored separately,
/// see [`cache_playlist_members`]).
pub async fn cache_playlist(pool: &SqlitePool, playlist: &PlaylistData) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO playlists (playlist_id, title, creator_user_id, track_count, permalink_url, raw_json)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(playlist_id) DO UPDATE SET
            title = excluded.title,
            creator_user_id = excluded.creator_user_id,
            track_count = excluded.track_count,
            permalink_url = excluded.permalink_url,
            raw_json = excluded.raw_json
        "#,
    )
    .bind(playlist.id)
    .bind(&playlist.title)
    .bind(playlist.creator_id())
    .bind(playlist.track_count)
    .bind(&playlist.permalink_url)
    .bind(playlist.raw.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Cache a playlist's member tracks and its membership in one
/// transaction: member rows, their artists, and the bridge rows all
/// commit together or not at all. Existing membership is replaced, so
/// tracks removed from the playlist upstream disappear here too.
///
/// Returns the number of member tracks written.
pub async fn cache_playlist_members(
    pool: &SqlitePool,
    playlist_id: i64,
    tracks: &[TrackData],
) -> sqlx::Result<usize> {
    let mut tx = pool.begin().await?;
    write_playlist_members(&mut tx, playlist_id, tracks).await?;
    tx.commit().await?;
    Ok(tracks.len())
}

async fn write_playlist_members(
    conn: &mut sqlx::SqliteConnection,
    playlist_id: i64,
    tracks: &[TrackData],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;
    for (position, track) in tracks.iter().enumerate() {
        upsert_track(&mut *conn, track).await?;
        if let Some(artist) = &track.artist {
            upsert_user(&mut *conn, artist).await?;
        }
        // a track repeated in the same playlist keeps its last position
        sqlx::query(
            r#"
            INSERT INTO playlist_tracks (playlist_id, track_id, position)
            VALUES (?, ?, ?)
            ON CONFLICT(playlist_id, track_id) DO UPDATE SET
                position = excluded.position
            "#,
        )
        .bind(playlist_id)
        .bind(track.id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Record a Layer-1 track relation. Last write wins on weight.
pub async fn add_related_track(
    pool: &SqlitePool,
    src_track_id: i64,
    dst_track_id: i64,
    relation_type: &RelationType,
    weight: f64,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO related_tracks (src_track_id, dst_track_id, relation_type, weight)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(src_track_id, dst_track_id, relation_type) DO UPDATE SET
            weight = excluded.weight,
            cached_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(src_track_id)
    .bind(dst_track_id)
    .bind(relation_type.as_str())
    .bind(weight)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a Layer-2 engagement. Last write wins on the count, so
/// re-sighting the same engagement on a later harvest refreshes the
/// row instead of inflating it.
pub async fn add_user_engagement(
    pool: &SqlitePool,
    user_id: i64,
    track_id: i64,
    engagement_type: EngagementType,
    count: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_engagements (user_id, track_id, engagement_type, engagement_count)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, track_id, engagement_type) DO UPDATE SET
            engagement_count = excluded.engagement_count,
            engaged_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(user_id)
    .bind(track_id)
    .bind(engagement_type.as_str())
    .bind(count)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a Layer-3 similarity for an unordered user pair.
///
/// Endpoints may arrive in either order; the row is stored with
/// `user_id_a < user_id_b` and the per-user totals swapped to match.
pub async fn add_user_similarity(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
    similarity_type: &RelationType,
    score: f64,
    common_tracks: i64,
    total_tracks_a: i64,
    total_tracks_b: i64,
) -> sqlx::Result<()> {
    let (a, b, total_a, total_b) = if user_a <= user_b {
        (user_a, user_b, total_tracks_a, total_tracks_b)
    } else {
        (user_b, user_a, total_tracks_b, total_tracks_a)
    };
    sqlx::query(
        r#"
        INSERT INTO user_similarities (
            user_id_a, user_id_b, similarity_type, similarity_score,
            common_tracks, total_tracks_a, total_tracks_b
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id_a, user_id_b, similarity_type) DO UPDATE SET
            similarity_score = excluded.similarity_score,
            common_tracks = excluded.common_tracks,
            total_tracks_a = excluded.total_tracks_a,
            total_tracks_b = excluded.total_tracks_b,
            computed_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(a)
    .bind(b)
    .bind(similarity_type.as_str())
    .bind(score)
    .bind(common_tracks)
    .bind(total_a)
    .bind(total_b)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a directed follow edge.
pub async fn add_user_follow(
    pool: &SqlitePool,
    follower_id: i64,
    followee_id: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_follows (follower_id, followee_id)
        VALUES (?, ?)
        ON CONFLICT(follower_id, followee_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(followee_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a Layer-4 relationship for an unordered artist pair, stored
/// with `artist_id_a < artist_id_b`.
pub async fn add_artist_relationship(
    pool: &SqlitePool,
    artist_a: i64,
    artist_b: i64,
    relationship_type: &RelationType,
    strength: f64,
    evidence_count: i64,
    metadata: Option<&serde_json::Value>,
) -> sqlx::Result<()> {
    let (a, b) = if artist_a <= artist_b {
        (artist_a, artist_b)
    } else {
        (artist_b, artist_a)
    };
    sqlx::query(
        r#"
        INSERT INTO artist_relationships (
            artist_id_a, artist_id_b, relationship_type, strength, evidence_count, metadata
        )
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(artist_id_a, artist_id_b, relationship_type) DO UPDATE SET
            strength = excluded.strength,
            evidence_count = excluded.evidence_count,
            metadata = excluded.metadata,
            computed_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(a)
    .bind(b)
    .bind(relationship_type.as_str())
    .bind(strength)
    .bind(evidence_count)
    .bind(metadata.map(|m| m.to_string()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Get a cached track by remote id.
pub async fn get_track(pool: &SqlitePool, track_id: i64) -> sqlx::Result<Option<Track>> {
    sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE track_id = ?")
        .bind(track_id)
        .fetch_optional(pool)
        .await
}

/// Get a cached user by remote id.
pub async fn get_user(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Get a cached playlist header by remote id.
pub async fn get_playlist(pool: &SqlitePool, playlist_id: i64) -> sqlx::Result<Option<Playlist>> {
    sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE playlist_id = ?")
        .bind(playlist_id)
        .fetch_optional(pool)
        .await
}

/// Layer-1 neighbors of a track, strongest first.
///
/// Optionally filtered by relation type and minimum weight. Ordering is
/// weight descending with insertion order (rowid) as the tiebreak, so
/// repeated queries return a stable list.
pub async fn get_related_tracks(
    pool: &SqlitePool,
    track_id: i64,
    relation_type: Option<&RelationType>,
    min_weight: f64,
    limit: i64,
) -> sqlx::Result<Vec<RelatedTrack>> {
    match relation_type {
        Some(rt) => {
            sqlx::query_as::<_, RelatedTrack>(
                r#"
                SELECT t.track_id, t.title, t.artist_id, t.artist_name,
                       rt.relation_type, rt.weight
                FROM related_tracks rt
                JOIN tracks t ON t.track_id = rt.dst_track_id
                WHERE rt.src_track_id = ? AND rt.relation_type = ? AND rt.weight >= ?
                ORDER BY rt.weight DESC, rt.rowid
                LIMIT ?
                "#,
            )
            .bind(track_id)
            .bind(rt.as_str())
            .bind(min_weight)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, RelatedTrack>(
                r#"
                SELECT t.track_id, t.title, t.artist_id, t.artist_name,
                       rt.relation_type, rt.weight
                FROM related_tracks rt
                JOIN tracks t ON t.track_id = rt.dst_track_id
                WHERE rt.src_track_id = ? AND rt.weight >= ?
                ORDER BY rt.weight DESC, rt.rowid
                LIMIT ?
                "#,
            )
            .bind(track_id)
            .bind(min_weight)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
}

/// Tracks a user has a `like` engagement for, joined with track metadata.
pub async fn get_user_liked_tracks(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<LikedTrack>> {
    sqlx::query_as::<_, LikedTrack>(
        r#"
        SELECT t.track_id, t.title, t.artist_id
        FROM user_engagements ue
        JOIN tracks t ON t.track_id = ue.track_id
        WHERE ue.user_id = ? AND ue.engagement_type = 'like'
        ORDER BY ue.rowid
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Users who engaged with a track, most-followed first.
pub async fn get_track_engagers(
    pool: &SqlitePool,
    track_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<TrackEngager>> {
    sqlx::query_as::<_, TrackEngager>(
        r#"
        SELECT u.user_id, u.username, u.followers_count,
               ue.engagement_type, ue.engagement_count
        FROM user_engagements ue
        JOIN users u ON u.user_id = ue.user_id
        WHERE ue.track_id = ?
        ORDER BY u.followers_count DESC, u.user_id
        LIMIT ?
        "#,
    )
    .bind(track_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Layer-3 neighbors of a user, most similar first.
///
/// Pair rows are stored `a < b`, so the queried user may sit on either
/// side; the CASE flips the row to face outward.
pub async fn get_similar_users(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<SimilarUser>> {
    sqlx::query_as::<_, SimilarUser>(
        r#"
        SELECT
            CASE WHEN user_id_a = ?1 THEN user_id_b ELSE user_id_a END AS similar_user_id,
            similarity_type,
            similarity_score,
            common_tracks
        FROM user_similarities
        WHERE user_id_a = ?1 OR user_id_b = ?1
        ORDER BY similarity_score DESC, rowid
        LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Layer-4 neighbors of an artist, strongest first.
pub async fn get_related_artists(
    pool: &SqlitePool,
    artist_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<RelatedArtist>> {
    sqlx::query_as::<_, RelatedArtist>(
        r#"
        SELECT
            CASE WHEN ar.artist_id_a = ?1 THEN ar.artist_id_b ELSE ar.artist_id_a END
                AS related_artist_id,
            u.username AS artist_name,
            ar.relationship_type,
            ar.strength,
            ar.evidence_count
        FROM artist_relationships ar
        LEFT JOIN users u
            ON u.user_id = CASE WHEN ar.artist_id_a = ?1 THEN ar.artist_id_b ELSE ar.artist_id_a END
        WHERE ar.artist_id_a = ?1 OR ar.artist_id_b = ?1
        ORDER BY ar.strength DESC, ar.rowid
        LIMIT ?2
        "#,
    )
    .bind(artist_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Distinct users holding at least one `like` engagement.
pub async fn get_engaged_user_ids(pool: &SqlitePool) -> sqlx::Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT DISTINCT user_id FROM user_engagements WHERE engagement_type = 'like' ORDER BY user_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// All cached playlist ids.
pub async fn get_playlist_ids(pool: &SqlitePool) -> sqlx::Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT playlist_id FROM playlists ORDER BY playlist_id")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Member track ids of a playlist in playlist order.
pub async fn get_playlist_track_ids(
    pool: &SqlitePool,
    playlist_id: i64,
) -> sqlx::Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT track_id FROM playlist_tracks WHERE playlist_id = ? ORDER BY position, track_id",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Distinct (user, artist) pairs implied by like engagements, for the
/// artist co-library pass. Tracks with no known artist are skipped.
pub async fn get_user_artist_pairs(pool: &SqlitePool) -> sqlx::Result<Vec<(i64, i64)>> {
    sqlx::query_as(
        r#"
        SELECT DISTINCT ue.user_id, t.artist_id
        FROM user_engagements ue
        JOIN tracks t ON t.track_id = ue.track_id
        WHERE ue.engagement_type = 'like' AND t.artist_id IS NOT NULL
        ORDER BY ue.user_id, t.artist_id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Whether a track is cached and fresh enough to skip a rewrite.
///
/// A row older than `max_age_hours` (by `updated_at`) counts as stale;
/// `max_age_hours <= 0` disables the age check and tests existence only.
/// Unparseable timestamps count as stale too, forcing a refresh.
pub async fn is_track_cached(
    pool: &SqlitePool,
    track_id: i64,
    max_age_hours: i64,
) -> sqlx::Result<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT updated_at FROM tracks WHERE track_id = ?")
            .bind(track_id)
            .fetch_optional(pool)
            .await?;

    let Some((updated_at,)) = row else {
        return Ok(false);
    };
    if max_age_hours <= 0 {
        return Ok(true);
    }
    let Ok(updated) = NaiveDateTime::parse_from_str(&updated_at, TIMESTAMP_FORMAT) else {
        return Ok(false);
    };
    let age = Utc::now().naive_utc() - updated;
    Ok(age <= chrono::Duration::hours(max_age_hours))
}

/// Per-table row counts for the `stats` command.
pub async fn get_cache_stats(pool: &SqlitePool) -> sqlx::Result<CacheStats> {
    async fn count(pool: &SqlitePool, table: &str) -> sqlx::Result<i64> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    Ok(CacheStats {
        tracks: count(pool, "tracks").await?,
        users: count(pool, "users").await?,
        playlists: count(pool, "playlists").await?,
        playlist_tracks: count(pool, "playlist_tracks").await?,
        related_tracks: count(pool, "related_tracks").await?,
        user_engagements: count(pool, "user_engagements").await?,
        user_similarities: count(pool, "user_similarities").await?,
        user_follows: count(pool, "user_follows").await?,
        artist_relationships: count(pool, "artist_relationships").await?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::traits::mocks::{playlist, track, track_by, user};

    /// Fresh in-temp-dir database for tests; the tempdir guard must be
    /// held for the pool's lifetime.
    pub(crate) async fn test_db() -> (tempfile::TempDir, SqlitePool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let url = format!("sqlite:{}", db_path.display());
        let pool = init_db(&url).await.expect("Failed to init db");
        (temp_dir, pool)
    }

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let (dir, pool) = test_db().await;
        assert!(dir.path().join("test.db").exists());
        let stats = get_cache_stats(&pool).await.unwrap();
        assert_eq!(stats.tracks, 0);
        assert_eq!(stats.related_tracks, 0);
    }

    #[tokio::test]
    async fn test_track_upsert_is_idempotent() {
        let (_dir, pool) = test_db().await;

        cache_track(&pool, &track_by(1, "First Title", 9, "artist9"))
            .await
            .unwrap();
        cache_track(&pool, &track_by(1, "Renamed Title", 9, "artist9"))
            .await
            .unwrap();

        let stored = get_track(&pool, 1).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed Title");
        assert_eq!(stored.artist_id, Some(9));

        let stats = get_cache_stats(&pool).await.unwrap();
        assert_eq!(stats.tracks, 1);
    }

    #[tokio::test]
    async fn test_user_and_playlist_roundtrip() {
        let (_dir, pool) = test_db().await;

        cache_user(&pool, &user(7, "listener7")).await.unwrap();
        let stored = get_user(&pool, 7).await.unwrap().unwrap();
        assert_eq!(stored.username, "listener7");

        let pl = playlist(100, "Late Night", 7, vec![track(1, "a"), track(2, "b")]);
        cache_playlist(&pool, &pl).await.unwrap();
        cache_playlist_members(&pool, 100, &pl.tracks).await.unwrap();

        let header = get_playlist(&pool, 100).await.unwrap().unwrap();
        assert_eq!(header.track_count, 2);
        assert_eq!(header.creator_user_id, Some(7));
        assert_eq!(get_playlist_track_ids(&pool, 100).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_playlist_members_cached_with_membership() {
        let (_dir, pool) = test_db().await;

        let members = vec![track_by(1, "a", 9, "artist9"), track(2, "b")];
        let written = cache_playlist_members(&pool, 100, &members).await.unwrap();
        assert_eq!(written, 2);

        // member tracks, their artist, and the bridge rows all landed
        assert!(get_track(&pool, 1).await.unwrap().is_some());
        assert!(get_user(&pool, 9).await.unwrap().is_some());
        assert_eq!(get_playlist_track_ids(&pool, 100).await.unwrap(), vec![1, 2]);

        // a rewrite replaces membership, dropping removed tracks
        cache_playlist_members(&pool, 100, &[track(3, "c")]).await.unwrap();
        assert_eq!(get_playlist_track_ids(&pool, 100).await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_playlist_member_write_rolls_back_as_one_unit() {
        let (_dir, pool) = test_db().await;
        let members = vec![track(1, "a"), track(2, "b")];

        // every row rides the same transaction: rolling it back must
        // leave no member tracks behind either
        let mut tx = pool.begin().await.unwrap();
        write_playlist_members(&mut tx, 100, &members).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(get_cache_stats(&pool).await.unwrap().tracks, 0);
        assert!(get_playlist_track_ids(&pool, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_related_tracks_ordering_and_filters() {
        let (_dir, pool) = test_db().await;
        for (id, title) in [(1, "seed"), (2, "b"), (3, "c"), (4, "d")] {
            cache_track(&pool, &track(id, title)).await.unwrap();
        }
        add_related_track(&pool, 1, 2, &RelationType::CoPlaylist, 0.4)
            .await
            .unwrap();
        add_related_track(&pool, 1, 3, &RelationType::CoPlaylist, 0.9)
            .await
            .unwrap();
        add_related_track(&pool, 1, 4, &RelationType::Other("semantic_title".into()), 0.9)
            .await
            .unwrap();

        let all = get_related_tracks(&pool, 1, None, 0.0, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        // equal weights fall back to insertion order
        assert_eq!(all[0].track_id, 3);
        assert_eq!(all[1].track_id, 4);
        assert_eq!(all[2].track_id, 2);

        let co_only = get_related_tracks(&pool, 1, Some(&RelationType::CoPlaylist), 0.5, 10)
            .await
            .unwrap();
        assert_eq!(co_only.len(), 1);
        assert_eq!(co_only[0].track_id, 3);
    }

    #[tokio::test]
    async fn test_engagement_rewrite_is_idempotent() {
        let (_dir, pool) = test_db().await;
        cache_track(&pool, &track(42, "t")).await.unwrap();
        cache_user(&pool, &user(7, "u7")).await.unwrap();

        // a re-harvest sights the same engagement again; the count must
        // not inflate across runs
        add_user_engagement(&pool, 7, 42, EngagementType::Like, 1)
            .await
            .unwrap();
        add_user_engagement(&pool, 7, 42, EngagementType::Like, 1)
            .await
            .unwrap();

        let engagers = get_track_engagers(&pool, 42, 10).await.unwrap();
        assert_eq!(engagers.len(), 1);
        assert_eq!(engagers[0].engagement_count, 1);
        assert_eq!(engagers[0].engagement_type, "like");

        // a fresher observed count replaces the stored one
        add_user_engagement(&pool, 7, 42, EngagementType::Like, 3)
            .await
            .unwrap();
        let engagers = get_track_engagers(&pool, 42, 10).await.unwrap();
        assert_eq!(engagers[0].engagement_count, 3);
    }

    #[tokio::test]
    async fn test_similarity_pair_is_canonicalized() {
        let (_dir, pool) = test_db().await;

        // written with endpoints reversed; totals must follow the swap
        add_user_similarity(&pool, 9, 3, &RelationType::JaccardLikes, 0.5, 4, 10, 20)
            .await
            .unwrap();
        add_user_similarity(&pool, 3, 9, &RelationType::JaccardLikes, 0.7, 5, 21, 11)
            .await
            .unwrap();

        let stats = get_cache_stats(&pool).await.unwrap();
        assert_eq!(stats.user_similarities, 1);

        let from_three = get_similar_users(&pool, 3, 10).await.unwrap();
        assert_eq!(from_three.len(), 1);
        assert_eq!(from_three[0].similar_user_id, 9);
        assert_eq!(from_three[0].similarity_score, 0.7);
        assert_eq!(from_three[0].common_tracks, 5);

        let from_nine = get_similar_users(&pool, 9, 10).await.unwrap();
        assert_eq!(from_nine[0].similar_user_id, 3);
    }

    #[tokio::test]
    async fn test_artist_relationship_canonicalized() {
        let (_dir, pool) = test_db().await;
        cache_user(&pool, &user(2, "artist_two")).await.unwrap();

        add_artist_relationship(
            &pool,
            8,
            2,
            &RelationType::CoLibrary,
            0.45,
            9,
            Some(&serde_json::json!({"source": "user_libraries"})),
        )
        .await
        .unwrap();
        // same unordered pair, other orientation
        add_artist_relationship(&pool, 2, 8, &RelationType::CoLibrary, 0.5, 10, None)
            .await
            .unwrap();

        let stats = get_cache_stats(&pool).await.unwrap();
        assert_eq!(stats.artist_relationships, 1);

        let related = get_related_artists(&pool, 8, 10).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].related_artist_id, 2);
        assert_eq!(related[0].artist_name.as_deref(), Some("artist_two"));
        assert_eq!(related[0].evidence_count, 10);
    }

    #[tokio::test]
    async fn test_liked_tracks_and_engaged_users() {
        let (_dir, pool) = test_db().await;
        for id in 1..=3 {
            cache_track(&pool, &track(id, &format!("t{id}"))).await.unwrap();
        }
        add_user_engagement(&pool, 5, 1, EngagementType::Like, 1)
            .await
            .unwrap();
        add_user_engagement(&pool, 5, 2, EngagementType::Like, 1)
            .await
            .unwrap();
        add_user_engagement(&pool, 5, 3, EngagementType::Repost, 1)
            .await
            .unwrap();
        add_user_engagement(&pool, 6, 1, EngagementType::Like, 1)
            .await
            .unwrap();

        let liked = get_user_liked_tracks(&pool, 5, 100).await.unwrap();
        let ids: Vec<i64> = liked.iter().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(get_engaged_user_ids(&pool).await.unwrap(), vec![5, 6]);
    }

    #[tokio::test]
    async fn test_track_freshness() {
        let (_dir, pool) = test_db().await;
        assert!(!is_track_cached(&pool, 1, 24).await.unwrap());

        cache_track(&pool, &track(1, "t")).await.unwrap();
        assert!(is_track_cached(&pool, 1, 24).await.unwrap());
        // zero or negative budget means existence-only, never stale
        assert!(is_track_cached(&pool, 1, 0).await.unwrap());
        assert!(is_track_cached(&pool, 1, -1).await.unwrap());
        // a missing row is uncached regardless of budget
        assert!(!is_track_cached(&pool, 2, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_follow_deduplicated() {
        let (_dir, pool) = test_db().await;
        add_user_follow(&pool, 1, 2).await.unwrap();
        add_user_follow(&pool, 1, 2).await.unwrap();
        add_user_follow(&pool, 2, 1).await.unwrap();
        // direction matters, so the reverse edge is a second row
        assert_eq!(get_cache_stats(&pool).await.unwrap().user_follows, 2);
    }
}
