//! Converts raw wire payloads into domain records.
//!
//! Validation policy (matches the error taxonomy): a record with no id is
//! skipped (single-record skip, never a batch failure); everything else is
//! defaulted. The full raw payload rides along on every domain record so
//! the cache can retain it verbatim.

use serde_json::Value;

use super::domain::{PlaylistData, ResolvedEntity, SourceError, TrackData, UserData};
use super::dto::{PlaylistDto, ResolvedDto, TrackDto, UserDto};

/// Convert one raw track payload. Errors only when the id is missing.
pub fn track_from_value(value: &Value) -> Result<TrackData, SourceError> {
    let dto: TrackDto =
        serde_json::from_value(value.clone()).map_err(|e| SourceError::Parse(e.to_string()))?;
    let id = dto.id.ok_or(SourceError::MissingId)?;

    let artist = dto.user.and_then(|u| user_from_dto(u, Value::Null).ok());

    Ok(TrackData {
        id,
        title: dto.title.unwrap_or_else(|| "Untitled".to_string()),
        artist,
        genre: dto.genre,
        tags: dto.tag_list.map(|t| t.into_tags()).unwrap_or_default(),
        duration_ms: dto.duration,
        playback_count: dto.playback_count.unwrap_or(0),
        like_count: dto.likes_count.or(dto.favoritings_count).unwrap_or(0),
        repost_count: dto.reposts_count.unwrap_or(0),
        permalink_url: dto.permalink_url,
        description: dto.description,
        label_name: dto.label_name,
        raw: value.clone(),
    })
}

/// Convert a page of track payloads, skipping records without an id.
pub fn tracks_from_value(value: &Value) -> Result<Vec<TrackData>, SourceError> {
    let items = as_array(value)?;
    let mut tracks = Vec::with_capacity(items.len());
    for item in items {
        match track_from_value(item) {
            Ok(t) => tracks.push(t),
            Err(SourceError::MissingId) => {
                tracing::debug!("skipping track payload with no id");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(tracks)
}

/// Convert one raw user payload.
pub fn user_from_value(value: &Value) -> Result<UserData, SourceError> {
    let dto: UserDto =
        serde_json::from_value(value.clone()).map_err(|e| SourceError::Parse(e.to_string()))?;
    user_from_dto(dto, value.clone())
}

fn user_from_dto(dto: UserDto, raw: Value) -> Result<UserData, SourceError> {
    let id = dto.id.ok_or(SourceError::MissingId)?;
    Ok(UserData {
        id,
        username: dto.username.unwrap_or_else(|| "Unknown".to_string()),
        permalink_url: dto.permalink_url,
        followers_count: dto.followers_count.unwrap_or(0),
        raw,
    })
}

/// Convert a page of user payloads, skipping records without an id.
pub fn users_from_value(value: &Value) -> Result<Vec<UserData>, SourceError> {
    let items = as_array(value)?;
    let mut users = Vec::with_capacity(items.len());
    for item in items {
        match user_from_value(item) {
            Ok(u) => users.push(u),
            Err(SourceError::MissingId) => {
                tracing::debug!("skipping user payload with no id");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(users)
}

/// Convert one raw playlist payload, including its embedded member tracks.
/// Member tracks without an id are dropped; the playlist itself errors only
/// when its own id is missing.
pub fn playlist_from_value(value: &Value) -> Result<PlaylistData, SourceError> {
    let dto: PlaylistDto =
        serde_json::from_value(value.clone()).map_err(|e| SourceError::Parse(e.to_string()))?;
    let id = dto.id.ok_or(SourceError::MissingId)?;

    let creator = dto.user.and_then(|u| user_from_dto(u, Value::Null).ok());
    let tracks = dto
        .tracks
        .iter()
        .filter_map(|t| track_from_value(t).ok())
        .collect();

    Ok(PlaylistData {
        id,
        title: dto.title.unwrap_or_else(|| "Untitled".to_string()),
        creator,
        track_count: dto.track_count.unwrap_or(0),
        permalink_url: dto.permalink_url,
        tracks,
        raw: value.clone(),
    })
}

/// Convert a page of playlist payloads, skipping records without an id.
pub fn playlists_from_value(value: &Value) -> Result<Vec<PlaylistData>, SourceError> {
    let items = as_array(value)?;
    let mut playlists = Vec::with_capacity(items.len());
    for item in items {
        match playlist_from_value(item) {
            Ok(p) => playlists.push(p),
            Err(SourceError::MissingId) => {
                tracing::debug!("skipping playlist payload with no id");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(playlists)
}

/// Dispatch a resolve response on its `kind` tag.
pub fn resolved_from_value(value: &Value) -> Result<ResolvedEntity, SourceError> {
    let tag: ResolvedDto =
        serde_json::from_value(value.clone()).map_err(|e| SourceError::Parse(e.to_string()))?;
    match tag.kind.as_deref() {
        Some("track") => Ok(ResolvedEntity::Track(track_from_value(value)?)),
        Some("user") => Ok(ResolvedEntity::User(user_from_value(value)?)),
        Some("playlist") => Ok(ResolvedEntity::Playlist(playlist_from_value(value)?)),
        Some(other) => Err(SourceError::Parse(format!(
            "resolve returned unknown kind '{other}'"
        ))),
        None => Err(SourceError::Parse("resolve response has no 'kind'".into())),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, SourceError> {
    value
        .as_array()
        .ok_or_else(|| SourceError::Parse("expected a JSON array page".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_defaults_applied() {
        let value = json!({"id": 9});
        let track = track_from_value(&value).unwrap();
        assert_eq!(track.title, "Untitled");
        assert_eq!(track.playback_count, 0);
        assert_eq!(track.like_count, 0);
        assert!(track.tags.is_empty());
        assert_eq!(track.raw, value);
    }

    #[test]
    fn test_track_missing_id_is_error() {
        let value = json!({"title": "No Id Here"});
        assert!(matches!(
            track_from_value(&value),
            Err(SourceError::MissingId)
        ));
    }

    #[test]
    fn test_like_count_fallback_to_favoritings() {
        let value = json!({"id": 1, "favoritings_count": 12});
        assert_eq!(track_from_value(&value).unwrap().like_count, 12);

        let both = json!({"id": 1, "likes_count": 7, "favoritings_count": 12});
        assert_eq!(track_from_value(&both).unwrap().like_count, 7);
    }

    #[test]
    fn test_page_skips_idless_records() {
        let page = json!([
            {"id": 1, "title": "A"},
            {"title": "missing id"},
            {"id": 2, "title": "B"}
        ]);
        let tracks = tracks_from_value(&page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].id, 2);
    }

    #[test]
    fn test_playlist_embedded_tracks() {
        let value = json!({
            "id": 50,
            "title": "Mix",
            "user": {"id": 3, "username": "dj"},
            "track_count": 3,
            "tracks": [{"id": 10}, {"no_id": true}, {"id": 11}]
        });
        let playlist = playlist_from_value(&value).unwrap();
        assert_eq!(playlist.creator_id(), Some(3));
        assert_eq!(playlist.tracks.len(), 2);
    }

    #[test]
    fn test_resolve_kind_dispatch() {
        let track = json!({"kind": "track", "id": 1});
        assert!(matches!(
            resolved_from_value(&track).unwrap(),
            ResolvedEntity::Track(_)
        ));

        let user = json!({"kind": "user", "id": 2, "username": "x"});
        assert!(matches!(
            resolved_from_value(&user).unwrap(),
            ResolvedEntity::User(_)
        ));

        let unknown = json!({"kind": "comment", "id": 3});
        assert!(resolved_from_value(&unknown).is_err());
    }

    #[test]
    fn test_non_array_page_is_parse_error() {
        let value = json!({"collection": []});
        assert!(matches!(
            tracks_from_value(&value),
            Err(SourceError::Parse(_))
        ));
    }
}
