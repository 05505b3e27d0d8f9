//! Phrase and channel catalog loading.
//!
//! The phrase catalog comes from the front end's data directory and appears
//! in two shapes: a plain JSON array of phrase strings, or an object keyed
//! by phrase key whose values carry `title`/`german` display text. Both are
//! accepted. When no catalog exists at all, phrases can be derived from an
//! existing index's keys (degraded mode).

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{IndexerError, Result};
use crate::index::PhraseIndex;
use crate::normalize::{key_to_display, normalize, phrase_key};

/// A catalog phrase with its stable index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub text: String,
    pub key: String,
}

impl Phrase {
    /// Build a phrase, rejecting text that normalizes to nothing.
    pub fn new(text: &str) -> Result<Self> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(IndexerError::InvalidPhrase(text.to_string()));
        }
        Ok(Self {
            text: text.to_string(),
            key: phrase_key(&normalized),
        })
    }

    /// The normalized needle handed to the matcher.
    pub fn needle(&self) -> String {
        key_to_display(&self.key)
    }
}

/// Load the phrase catalog from a JSON file.
///
/// Phrases that normalize to nothing are dropped with a warning; distinct
/// phrases sharing a key are kept and share one index bucket.
pub fn load_phrases(path: &Path) -> Result<Vec<Phrase>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value =
        serde_json::from_str(&content).map_err(|source| IndexerError::InvalidCatalog {
            path: path.to_path_buf(),
            source,
        })?;

    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, entry)| display_text(&key, &entry))
            .collect(),
        _ => {
            return Err(IndexerError::InvalidCatalog {
                path: path.to_path_buf(),
                source: serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "expected a JSON array or object",
                )),
            })
        }
    };

    let mut phrases = Vec::with_capacity(raw.len());
    for text in raw {
        match Phrase::new(&text) {
            Ok(phrase) => phrases.push(phrase),
            Err(_) => warn!("Skipping phrase {:?}: normalizes to empty text", text),
        }
    }

    info!("Loaded {} phrases from {}", phrases.len(), path.display());
    Ok(phrases)
}

/// Pick the display text for an object-shaped catalog entry: `title`, then
/// `german`, then the key's display form.
fn display_text(key: &str, entry: &Value) -> String {
    entry
        .get("title")
        .or_else(|| entry.get("german"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| key_to_display(key))
}

/// Degraded mode: no catalog file, but a prior index exists; its keys
/// become the phrase list.
pub fn phrases_from_index(index: &PhraseIndex) -> Vec<Phrase> {
    index
        .keys()
        .filter_map(|key| Phrase::new(&key_to_display(key)).ok())
        .collect()
}

/// Load the channel catalog: a JSON object mapping category name to a list
/// of channel IDs. Returns the flattened ID list in category order.
pub fn load_channels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let groups: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&content).map_err(|source| IndexerError::InvalidCatalog {
            path: path.to_path_buf(),
            source,
        })?;

    let mut channels = Vec::new();
    for (category, ids) in &groups {
        info!("Channel category {:?}: {} channels", category, ids.len());
        channels.extend(ids.iter().cloned());
    }
    channels.dedup();
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_array_catalog() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "phrases.json", r#"["Guten Morgen", "Wie geht's?"]"#);

        let phrases = load_phrases(&path).unwrap();
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].key, "guten_morgen");
        assert_eq!(phrases[1].needle(), "wie gehts");
    }

    #[test]
    fn test_object_catalog_prefers_title_then_german() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "phrases.json",
            r#"{
                "guten_morgen": {"title": "Guten Morgen"},
                "vielen_dank": {"german": "Vielen Dank"},
                "bis_bald": {}
            }"#,
        );

        let phrases = load_phrases(&path).unwrap();
        let texts: Vec<&str> = phrases.iter().map(|p| p.text.as_str()).collect();
        assert!(texts.contains(&"Guten Morgen"));
        assert!(texts.contains(&"Vielen Dank"));
        assert!(texts.contains(&"bis bald"));
    }

    #[test]
    fn test_unusable_phrases_are_dropped() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "phrases.json", r#"["Guten Morgen", "???", ""]"#);
        let phrases = load_phrases(&path).unwrap();
        assert_eq!(phrases.len(), 1);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "phrases.json", "not json");
        let err = load_phrases(&path).unwrap_err();
        assert!(matches!(err, IndexerError::InvalidCatalog { .. }));
    }

    #[test]
    fn test_phrases_from_index_round_trip() {
        let mut index = PhraseIndex::new();
        index.merge(
            "guten_morgen",
            vec![crate::index::ClipCandidate {
                video_id: "v1".to_string(),
                start_sec: 9,
                end_sec: 12,
                title: String::new(),
                channel: String::new(),
                thumbnail_url: String::new(),
                context_before: String::new(),
                context_after: String::new(),
                score: 1.0,
            }],
            3,
        );

        let phrases = phrases_from_index(&index);
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].text, "guten morgen");
        assert_eq!(phrases[0].key, "guten_morgen");
    }

    #[test]
    fn test_channel_catalog_flattens_categories() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "channels.json",
            r#"{"comedy": ["UCaaa"], "news": ["UCbbb", "UCccc"]}"#,
        );
        let channels = load_channels(&path).unwrap();
        assert_eq!(channels, ["UCaaa", "UCbbb", "UCccc"]);
    }
}
