//! Candidate merging, deduplication and capping.

use crate::index::ClipCandidate;
use std::collections::HashSet;

/// Merge `incoming` candidates into `existing`, preserving discovery order,
/// dropping duplicates by video ID (first occurrence wins) and truncating
/// to `cap`.
///
/// Discovery order is the ranking: candidates already in the index precede
/// new ones, and channel-pass results are merged before fallback-pass
/// results, so curated-channel clips outrank raw search relevance.
pub fn merge_candidates(
    existing: Vec<ClipCandidate>,
    incoming: Vec<ClipCandidate>,
    cap: usize,
) -> Vec<ClipCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(cap);

    for candidate in existing.into_iter().chain(incoming) {
        if merged.len() >= cap {
            break;
        }
        if seen.insert(candidate.video_id.clone()) {
            merged.push(candidate);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(video_id: &str, score: f64) -> ClipCandidate {
        ClipCandidate {
            video_id: video_id.to_string(),
            start_sec: 10,
            end_sec: 14,
            title: format!("video {video_id}"),
            channel: "Kanal".to_string(),
            thumbnail_url: String::new(),
            context_before: String::new(),
            context_after: String::new(),
            score,
        }
    }

    #[test]
    fn test_existing_candidates_come_first() {
        let merged = merge_candidates(
            vec![candidate("a", 0.9)],
            vec![candidate("b", 1.0), candidate("c", 1.0)],
            3,
        );
        let ids: Vec<&str> = merged.iter().map(|c| c.video_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_duplicates_first_occurrence_wins() {
        let merged = merge_candidates(
            vec![candidate("a", 0.9)],
            vec![candidate("a", 1.0), candidate("b", 1.0)],
            3,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].video_id, "a");
        assert_eq!(merged[0].score, 0.9);
    }

    #[test]
    fn test_truncates_to_cap() {
        let incoming = vec![
            candidate("a", 1.0),
            candidate("b", 1.0),
            candidate("c", 1.0),
            candidate("d", 1.0),
        ];
        let merged = merge_candidates(Vec::new(), incoming, 3);
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|c| c.video_id != "d"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_candidates(Vec::new(), Vec::new(), 3).is_empty());
    }
}
