//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\soundgraph\config.toml
//! - macOS: ~/Library/Application Support/soundgraph/config.toml
//! - Linux: ~/.config/soundgraph/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup; CLI flags override individual fields per invocation. The
//! harvest defaults are deliberately aggressive: the engine is built to
//! collect everything it can reach, then let the thresholds in
//! [`ProcessingConfig`] filter signal from the pile afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote source connection and credentials
    pub source: SourceConfig,

    /// Harvest limits and phase toggles
    pub harvest: HarvestConfig,

    /// Post-ingestion derivation thresholds
    pub processing: ProcessingConfig,

    /// Personal graph view settings
    pub graph: GraphConfig,
}

/// Remote source connection settings.
///
/// Either `access_token` (preferred) or `client_id` must be set; with
/// neither, the client refuses to construct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// API base URL
    pub base_url: String,

    /// Public client id, sent as a query parameter
    pub client_id: Option<String>,

    /// OAuth access token, sent as a bearer header
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries for transient failures (rate limits, 5xx, network)
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.soundcloud.com".to_string(),
            client_id: None,
            access_token: None,
            request_timeout_secs: 20,
            max_retries: 3,
        }
    }
}

/// Harvest limits and phase toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Cap on likers/reposters collected per track
    pub max_users_per_track: usize,

    /// Cap on liked tracks pulled per engaged user
    pub max_tracks_per_user: usize,

    /// Cap on playlists pulled per user
    pub max_playlists: usize,

    /// Cap on discography search results per artist
    pub max_artist_tracks: usize,

    /// Cap on search results per fuzzy key-term query
    pub fuzzy_search_limit: usize,

    /// Similarity cutoff for the semantic phase, in [0, 1]
    pub name_similarity_threshold: f64,

    /// Enable phase 5 (commenter crawl)
    pub enable_commentary_layer: bool,

    /// Enable phase 6 (label catalog crawl)
    pub enable_label_layer: bool,

    /// Enable phase 7 (mentioned-entity crawl)
    pub enable_contextual_layer: bool,

    /// Delay between page requests, in milliseconds
    pub request_delay_ms: u64,

    /// Track rows younger than this are not rewritten when sighted
    /// again; 0 disables the age check (any cached row counts as fresh)
    pub cache_max_age_hours: i64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_users_per_track: 500,
            max_tracks_per_user: 500,
            max_playlists: 200,
            max_artist_tracks: 1000,
            fuzzy_search_limit: 100,
            name_similarity_threshold: 0.6,
            enable_commentary_layer: true,
            enable_label_layer: true,
            enable_contextual_layer: true,
            request_delay_ms: 300,
            cache_max_age_hours: 24,
        }
    }
}

/// Thresholds for the post-ingestion derivation passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Minimum shared liked tracks for a user similarity row
    pub min_common_tracks: usize,

    /// Minimum Jaccard score for a user similarity row
    pub min_similarity_score: f64,

    /// Minimum shared playlists for a track co-occurrence edge
    pub min_co_occurrence: usize,

    /// Minimum strength for an artist relationship row
    pub min_artist_strength: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            min_common_tracks: 3,
            min_similarity_score: 0.1,
            min_co_occurrence: 2,
            min_artist_strength: 0.3,
        }
    }
}

/// Personal graph view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// BFS expansion depth from the seed
    pub max_depth: usize,

    /// Tracks expanded per BFS batch
    pub batch_size: usize,

    /// Layer-1 neighbors attached per track
    pub neighbor_limit: i64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            batch_size: 50,
            neighbor_limit: 20,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("soundgraph"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    // Ensure directory exists
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[source]"));
        assert!(toml.contains("[harvest]"));
        assert!(toml.contains("[processing]"));
        assert!(toml.contains("[graph]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.source.client_id = Some("abc123".to_string());
        config.harvest.max_users_per_track = 50;
        config.processing.min_similarity_score = 0.25;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.source.client_id, Some("abc123".to_string()));
        assert_eq!(parsed.harvest.max_users_per_track, 50);
        assert_eq!(parsed.processing.min_similarity_score, 0.25);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        // Config with only some fields
        let toml = r#"
[source]
access_token = "tok"

[harvest]
enable_label_layer = false
"#;
        let config: Config = toml::from_str(toml).unwrap();

        // Specified fields are set
        assert_eq!(config.source.access_token, Some("tok".to_string()));
        assert!(!config.harvest.enable_label_layer);

        // Other fields use defaults
        assert_eq!(config.source.request_timeout_secs, 20);
        assert_eq!(config.harvest.max_tracks_per_user, 500);
        assert_eq!(config.processing.min_common_tracks, 3);
        assert_eq!(config.graph.batch_size, 50);
    }

    #[test]
    fn test_harvest_defaults_match_aggressive_profile() {
        let harvest = HarvestConfig::default();
        assert_eq!(harvest.max_users_per_track, 500);
        assert_eq!(harvest.max_artist_tracks, 1000);
        assert_eq!(harvest.name_similarity_threshold, 0.6);
        assert_eq!(harvest.request_delay_ms, 300);
        assert!(harvest.enable_commentary_layer);
    }
}
