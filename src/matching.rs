//! Fuzzy similarity scoring between normalized transcript text and phrases.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{IndexerError, Result};

/// Acceptance threshold: a segment is considered to contain the phrase when
/// its score reaches this value.
pub const SCORE_THRESHOLD: f64 = 0.85;

/// How the transcript scanner selects among matching segments in a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// First segment crossing the threshold wins. Cheap: the scan stops at
    /// the first hit, which matters when many phrase/video pairs are scanned.
    #[default]
    FirstMatch,
    /// Scan the whole transcript and keep the highest-scoring segment.
    BestOfVideo,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first-match" => Ok(MatchPolicy::FirstMatch),
            "best-of-video" => Ok(MatchPolicy::BestOfVideo),
            other => Err(format!(
                "unknown match policy {other:?} (expected first-match or best-of-video)"
            )),
        }
    }
}

/// Score how likely `needle` is spoken within `haystack`.
///
/// Both inputs must already be normalized (see [`crate::normalize`]).
/// Returns the maximum of two sub-scores:
///
/// - **word coverage**: fraction of the needle's words present in the
///   haystack's word set. Brittle for one/two-word phrases, where a single
///   ASR substitution zeroes it.
/// - **character-pair coverage**: fraction of the needle's distinct
///   in-word character pairs found in the haystack, the fallback signal
///   that still catches near-misses like "gutem morgem".
///
/// Taking the max rather than an average keeps exact matches from being
/// penalized on the weaker axis. An exact substring is an immediate 1.0.
///
/// An empty needle is invalid input and is rejected, never scored.
pub fn score(haystack: &str, needle: &str) -> Result<f64> {
    if needle.is_empty() {
        return Err(IndexerError::InvalidPhrase(needle.to_string()));
    }
    if haystack.contains(needle) {
        return Ok(1.0);
    }
    Ok(word_coverage(haystack, needle).max(char_pair_coverage(haystack, needle)))
}

fn word_coverage(haystack: &str, needle: &str) -> f64 {
    let hay_words: HashSet<&str> = haystack.split(' ').collect();
    let needle_words: Vec<&str> = needle.split(' ').collect();
    if needle_words.is_empty() {
        return 0.0;
    }
    let hits = needle_words
        .iter()
        .filter(|w| hay_words.contains(*w))
        .count();
    hits as f64 / needle_words.len() as f64
}

fn char_pair_coverage(haystack: &str, needle: &str) -> f64 {
    let needle_pairs = char_pairs(needle);
    if needle_pairs.is_empty() {
        return 0.0;
    }
    let hay_pairs = char_pairs(haystack);
    let hits = needle_pairs.intersection(&hay_pairs).count();
    hits as f64 / needle_pairs.len() as f64
}

/// Distinct adjacent character pairs within each word. A one-letter word
/// contributes the letter itself so it still participates in coverage.
fn char_pairs(text: &str) -> HashSet<String> {
    let mut pairs = HashSet::new();
    for word in text.split(' ') {
        let chars: Vec<char> = word.chars().collect();
        match chars.len() {
            0 => {}
            1 => {
                pairs.insert(chars[0].to_string());
            }
            _ => {
                for pair in chars.windows(2) {
                    pairs.insert(pair.iter().collect());
                }
            }
        }
    }
    pairs
}
