use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::IndexerError;
use crate::matching::{MatchPolicy, SCORE_THRESHOLD};

/// Configuration for the phrase-to-clip indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog and artifact paths
    pub catalog: CatalogConfig,

    /// External API settings
    pub api: ApiConfig,

    /// Matching and quota settings
    pub matching: MatchingConfig,

    /// Call pacing and retry settings
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Phrase catalog JSON file
    pub phrases_path: PathBuf,

    /// Channel catalog JSON file; absence skips the channel pass
    pub channels_path: Option<PathBuf>,

    /// Persisted index artifact
    pub index_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Transcript and search relevance language
    pub language: String,

    /// Search results requested per query
    pub search_page_size: usize,

    /// HTTP request timeout (seconds)
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Acceptance threshold for segment scores
    pub threshold: f64,

    /// Quota ceiling: clip candidates retained per phrase
    pub max_candidates: usize,

    /// Segment selection policy within one video
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Fixed delay between external calls in the fallback pass (ms)
    pub search_delay_ms: u64,

    /// Recent uploads examined per channel
    pub uploads_per_channel: usize,

    /// Bound on merged search candidates per phrase in the fallback pass
    pub fallback_candidate_limit: usize,

    /// Attempts per external call before a transient failure is skipped
    pub max_attempts: u32,

    /// Base backoff delay (ms), doubled per attempt with jitter
    pub backoff_base_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            phrases_path: PathBuf::from("data/german_phrases.json"),
            channels_path: None,
            index_path: PathBuf::from("data/youtube_index.json"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            language: "de".to_string(),
            search_page_size: 8,
            request_timeout_secs: 30,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: SCORE_THRESHOLD,
            max_candidates: 3,
            policy: MatchPolicy::FirstMatch,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: 400,
            uploads_per_channel: 30,
            fallback_candidate_limit: 12,
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            api: ApiConfig::default(),
            matching: MatchingConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first usable file, then apply
    /// environment overrides on top.
    pub fn load() -> Self {
        let config_paths = ["phrase-indexer.toml", "config/phrase-indexer.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from: {}", path);
                        return config.with_env_overrides();
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::default().with_env_overrides()
    }

    /// Apply `PHRASE_INDEXER_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("PHRASE_INDEXER_LANGUAGE") {
            self.api.language = language;
        }
        if let Ok(cap) = std::env::var("PHRASE_INDEXER_MAX_CANDIDATES") {
            if let Ok(cap) = cap.parse() {
                self.matching.max_candidates = cap;
            }
        }
        if let Ok(delay) = std::env::var("PHRASE_INDEXER_DELAY_MS") {
            if let Ok(delay) = delay.parse() {
                self.pacing.search_delay_ms = delay;
            }
        }
        if let Ok(path) = std::env::var("PHRASE_INDEXER_INDEX_PATH") {
            self.catalog.index_path = PathBuf::from(path);
        }
        self
    }

    /// Validate configuration before any work begins.
    pub fn validate(&self) -> Result<()> {
        if self.matching.max_candidates == 0 {
            return Err(anyhow!("matching.max_candidates must be greater than 0"));
        }
        if !(self.matching.threshold > 0.0 && self.matching.threshold <= 1.0) {
            return Err(anyhow!("matching.threshold must be within (0, 1]"));
        }
        if self.api.search_page_size == 0 {
            return Err(anyhow!("api.search_page_size must be greater than 0"));
        }
        if self.pacing.max_attempts == 0 {
            return Err(anyhow!("pacing.max_attempts must be greater than 0"));
        }
        Ok(())
    }
}

/// The quota-limited API credential, environment-only: `YT_API_KEY` with
/// `GOOGLE_API_KEY` as fallback. Missing credential is a fatal startup
/// error; the key is never read from or written to config files.
pub fn api_key_from_env() -> std::result::Result<String, IndexerError> {
    std::env::var("YT_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(IndexerError::MissingApiKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.max_candidates, 3);
        assert_eq!(config.matching.threshold, SCORE_THRESHOLD);
        assert_eq!(config.api.language, "de");
    }

    #[test]
    fn test_zero_cap_is_rejected() {
        let mut config = Config::default();
        config.matching.max_candidates = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = Config::default();
        config.matching.threshold = 0.0;
        assert!(config.validate().is_err());
        config.matching.threshold = 1.5;
        assert!(config.validate().is_err());
        config.matching.threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [matching]
            max_candidates = 5
            policy = "best-of-video"
            "#,
        )
        .unwrap();
        assert_eq!(config.matching.max_candidates, 5);
        assert_eq!(config.matching.policy, MatchPolicy::BestOfVideo);
        assert_eq!(config.pacing.search_delay_ms, 400);
    }
}
