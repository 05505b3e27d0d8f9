//! The persisted phrase index and its on-disk store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{IndexerError, Result};
use crate::rank;

/// A discovered video segment believed to contain a spoken phrase.
///
/// Serialized field names match the artifact consumed by the front end
/// (`videoId`, `start`, `end`, `contextBefore`, ...).
///
/// Invariants: `start_sec < end_sec`, `score` within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipCandidate {
    pub video_id: String,
    #[serde(rename = "start")]
    pub start_sec: u64,
    #[serde(rename = "end")]
    pub end_sec: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub context_before: String,
    #[serde(default)]
    pub context_after: String,
    #[serde(default)]
    pub score: f64,
}

/// In-memory index: phrase key → ordered clip candidates.
///
/// Owned by the orchestrator for the duration of a run; `IndexStore` is the
/// only component that reads or writes the backing file. A `BTreeMap` keeps
/// the persisted artifact deterministically ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseIndex {
    entries: BTreeMap<String, Vec<ClipCandidate>>,
}

impl PhraseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ClipCandidate>)> {
        self.entries.iter()
    }

    /// Candidates currently held for a phrase key (empty slice if none).
    pub fn candidates(&self, key: &str) -> &[ClipCandidate] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a phrase already holds its full quota of candidates.
    pub fn at_cap(&self, key: &str, cap: usize) -> bool {
        self.candidates(key).len() >= cap
    }

    /// Whether a video already contributes a candidate for a phrase.
    pub fn has_video(&self, key: &str, video_id: &str) -> bool {
        self.candidates(key).iter().any(|c| c.video_id == video_id)
    }

    /// Merge new candidates into a phrase's entry, deduplicating by video
    /// and capping the list. Returns how many candidates were added.
    pub fn merge(&mut self, key: &str, incoming: Vec<ClipCandidate>, cap: usize) -> usize {
        let existing = self.entries.remove(key).unwrap_or_default();
        let before = existing.len();
        let merged = rank::merge_candidates(existing, incoming, cap);
        let added = merged.len() - before;
        if !merged.is_empty() {
            self.entries.insert(key.to_string(), merged);
        }
        added
    }
}

/// Loads and persists the index file. The only reader/writer of that path.
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the existing index. A missing file is an empty index, not an
    /// error; a file that exists but fails to parse is a hard error so a
    /// prior run's results are never silently discarded.
    pub fn load(&self) -> Result<PhraseIndex> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No index file at {}, starting empty", self.path.display());
                return Ok(PhraseIndex::new());
            }
            Err(e) => return Err(e.into()),
        };

        let index: PhraseIndex =
            serde_json::from_str(&content).map_err(|source| IndexerError::CorruptIndex {
                path: self.path.clone(),
                source,
            })?;
        info!(
            "Loaded index with {} phrase entries from {}",
            index.len(),
            self.path.display()
        );
        Ok(index)
    }

    /// Persist the full index as one pretty-printed JSON document.
    ///
    /// Writes to a temporary file in the target directory and renames over
    /// the destination, so an interrupted run can never leave a truncated
    /// index behind.
    pub fn save(&self, index: &PhraseIndex) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let json = serde_json::to_string_pretty(index).map_err(|source| {
            IndexerError::CorruptIndex {
                path: self.path.clone(),
                source,
            }
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!(
            "Saved index with {} phrase entries to {}",
            index.len(),
            self.path.display()
        );
        Ok(())
    }
}
