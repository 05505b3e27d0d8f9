use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for the indexing pipeline.
///
/// Only `MissingApiKey` is fatal; everything else stays inside the item
/// boundary it occurred in (one phrase, one video, one channel).
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("missing API credential: set YT_API_KEY or GOOGLE_API_KEY")]
    MissingApiKey,

    #[error("phrase {0:?} normalizes to empty text")]
    InvalidPhrase(String),

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("no transcript available for video {video_id}")]
    TranscriptUnavailable { video_id: String },

    #[error("index file {path} is corrupt: {source}")]
    CorruptIndex {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("catalog file {path} is not valid JSON: {source}")]
    InvalidCatalog {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    /// Whether a failed call is worth retrying with backoff.
    ///
    /// Quota-limited APIs routinely answer with 429/5xx before recovering,
    /// and connection-level failures are usually momentary.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::Api(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                match e.status() {
                    Some(status) => status.as_u16() == 429 || status.is_server_error(),
                    None => false,
                }
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
