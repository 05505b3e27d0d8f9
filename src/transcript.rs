//! Transcript fetching and scanning.
//!
//! Transcripts arrive as an ordered list of timed segments per video. The
//! scanner walks them in order, scores each against a normalized phrase and
//! assembles a clip candidate with a padded timestamp window plus the spoken
//! context around the match.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IndexerError, Result};
use crate::index::ClipCandidate;
use crate::matching::{self, MatchPolicy};
use crate::normalize::normalize;
use crate::youtube::VideoMetadata;

/// How far around a matched segment spoken context is collected.
pub const CONTEXT_RADIUS_MS: u64 = 5000;

/// Captions occasionally omit a duration; two seconds is assumed for those.
pub const DEFAULT_SEGMENT_DURATION_MS: u64 = 2000;

/// One caption line with its timing. Ordered ascending by `offset_ms`
/// within a video; never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub offset_ms: u64,
    pub duration_ms: u64,
    pub text: String,
}

/// Source of transcripts, keyed by `(video_id, language)`.
///
/// Failure is expected and common (no captions, private or region-locked
/// videos); callers treat it as a per-video skip, never as a run failure.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str, lang: &str) -> Result<Vec<TranscriptSegment>>;
}

/// Fetches captions from YouTube's timedtext endpoint.
pub struct TimedTextFetcher {
    client: Client,
    base_url: String,
    segment_re: Regex,
}

impl TimedTextFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, "https://video.google.com/timedtext".to_string())
    }

    pub fn with_base_url(client: Client, base_url: String) -> Self {
        let segment_re =
            Regex::new(r#"(?s)<text start="([0-9.]+)"(?: dur="([0-9.]+)")?[^>]*>(.*?)</text>"#)
                .expect("segment regex is valid");
        Self {
            client,
            base_url,
            segment_re,
        }
    }

    fn parse(&self, body: &str) -> Vec<TranscriptSegment> {
        let mut segments: Vec<TranscriptSegment> = self
            .segment_re
            .captures_iter(body)
            .filter_map(|caps| {
                let start_secs: f64 = caps.get(1)?.as_str().parse().ok()?;
                let duration_ms = match caps.get(2) {
                    Some(dur) => (dur.as_str().parse::<f64>().ok()? * 1000.0).round() as u64,
                    None => DEFAULT_SEGMENT_DURATION_MS,
                };
                let text = decode_entities(caps.get(3)?.as_str());
                Some(TranscriptSegment {
                    offset_ms: (start_secs * 1000.0).round() as u64,
                    duration_ms,
                    text,
                })
            })
            .collect();
        // The endpoint emits segments in playback order; sorting re-asserts
        // the invariant the scanner depends on.
        segments.sort_by_key(|s| s.offset_ms);
        segments
    }
}

#[async_trait]
impl TranscriptFetcher for TimedTextFetcher {
    async fn fetch(&self, video_id: &str, lang: &str) -> Result<Vec<TranscriptSegment>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("lang", lang), ("v", video_id)])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let segments = self.parse(&body);
        if segments.is_empty() {
            // The endpoint answers 200 with an empty document when a video
            // has no captions in the requested language.
            return Err(IndexerError::TranscriptUnavailable {
                video_id: video_id.to_string(),
            });
        }
        debug!("Fetched {} transcript segments for {}", segments.len(), video_id);
        Ok(segments)
    }
}

/// Minimal XML entity decoding for caption text.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Walk a video's transcript looking for `needle` (a normalized phrase).
///
/// Under [`MatchPolicy::FirstMatch`] the first segment crossing `threshold`
/// wins and the scan stops; [`MatchPolicy::BestOfVideo`] scans to the end
/// and keeps the highest-scoring segment. Returns `None` when no segment
/// qualifies.
pub fn scan_segments(
    video_id: &str,
    segments: &[TranscriptSegment],
    needle: &str,
    meta: Option<&VideoMetadata>,
    threshold: f64,
    policy: MatchPolicy,
) -> Result<Option<ClipCandidate>> {
    let mut best: Option<(usize, f64)> = None;

    for (i, segment) in segments.iter().enumerate() {
        let haystack = normalize(&segment.text);
        let score = matching::score(&haystack, needle)?;
        if score < threshold {
            continue;
        }
        match policy {
            MatchPolicy::FirstMatch => {
                best = Some((i, score));
                break;
            }
            MatchPolicy::BestOfVideo => {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
        }
    }

    Ok(best.map(|(i, score)| build_candidate(video_id, segments, i, score, meta)))
}

fn build_candidate(
    video_id: &str,
    segments: &[TranscriptSegment],
    matched: usize,
    score: f64,
    meta: Option<&VideoMetadata>,
) -> ClipCandidate {
    let segment = &segments[matched];

    // One second of padding on each side so playback does not clip speech.
    let start_sec = (segment.offset_ms / 1000).saturating_sub(1);
    let end_sec = start_sec + segment.duration_ms.div_ceil(1000) + 1;

    let window_start = segment.offset_ms.saturating_sub(CONTEXT_RADIUS_MS);
    let window_end = segment.offset_ms + CONTEXT_RADIUS_MS;

    let context_before = segments[..matched]
        .iter()
        .rev()
        .take_while(|s| s.offset_ms >= window_start)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    let context_after = segments[matched + 1..]
        .iter()
        .take_while(|s| s.offset_ms <= window_end)
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    ClipCandidate {
        video_id: video_id.to_string(),
        start_sec,
        end_sec,
        title: meta.map(|m| m.title.clone()).unwrap_or_default(),
        channel: meta.map(|m| m.channel.clone()).unwrap_or_default(),
        thumbnail_url: meta.map(|m| m.thumbnail_url.clone()).unwrap_or_default(),
        context_before,
        context_after,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::SCORE_THRESHOLD;
    use crate::normalize::normalize;

    fn segment(offset_ms: u64, duration_ms: u64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            offset_ms,
            duration_ms,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_exact_match_produces_padded_window() {
        let segments = vec![segment(10_000, 2_000, "Guten Morgen allerseits")];
        let needle = normalize("Guten Morgen");

        let candidate = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap()
        .expect("segment should match");

        assert_eq!(candidate.start_sec, 9);
        assert_eq!(candidate.end_sec, 12);
        assert_eq!(candidate.score, 1.0);
    }

    #[test]
    fn test_low_scoring_segment_is_skipped() {
        let segments = vec![
            segment(0, 2_000, "wie geht es dir"),
            segment(20_000, 2_000, "wie geht's"),
        ];
        let needle = normalize("Wie geht's?");

        let candidate = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap()
        .expect("second segment should match");

        // Scanner proceeded past the near-miss to the later exact segment.
        assert_eq!(candidate.start_sec, 19);
    }

    #[test]
    fn test_no_match_returns_none() {
        let segments = vec![segment(0, 2_000, "voellig anderes thema")];
        let needle = normalize("Guten Morgen");
        let result = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_context_window_is_bounded_by_radius() {
        let segments = vec![
            segment(1_000, 2_000, "viel zu frueh"),
            segment(6_000, 2_000, "kurz davor"),
            segment(10_000, 2_000, "Guten Morgen allerseits"),
            segment(13_000, 2_000, "direkt danach"),
            segment(16_000, 2_000, "viel zu spaet"),
        ];
        let needle = normalize("Guten Morgen");

        let candidate = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap()
        .unwrap();

        assert_eq!(candidate.context_before, "kurz davor");
        assert_eq!(candidate.context_after, "direkt danach");
    }

    #[test]
    fn test_early_offset_clamps_start_to_zero() {
        let segments = vec![segment(500, 1_500, "Guten Morgen")];
        let needle = normalize("Guten Morgen");
        let candidate = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap()
        .unwrap();
        assert_eq!(candidate.start_sec, 0);
        assert!(candidate.start_sec < candidate.end_sec);
    }

    #[test]
    fn test_best_of_video_keeps_highest_score() {
        // First segment is a fuzzy hit, a later one is exact; best-of-video
        // must keep the exact one while first-match stops early.
        let segments = vec![
            segment(0, 2_000, "gutem morgem allerseits"),
            segment(20_000, 2_000, "guten morgen allerseits"),
        ];
        let needle = normalize("Guten Morgen");

        let first = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap()
        .unwrap();
        let best = scan_segments(
            "vid1",
            &segments,
            &needle,
            None,
            SCORE_THRESHOLD,
            MatchPolicy::BestOfVideo,
        )
        .unwrap()
        .unwrap();

        assert_eq!(first.start_sec, 0);
        assert_eq!(best.start_sec, 19);
        assert_eq!(best.score, 1.0);
    }

    #[test]
    fn test_empty_needle_is_rejected_before_scanning() {
        let segments = vec![segment(0, 2_000, "irgendwas")];
        let err = scan_segments(
            "vid1",
            &segments,
            "",
            None,
            SCORE_THRESHOLD,
            MatchPolicy::FirstMatch,
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidPhrase(_)));
    }

    #[test]
    fn test_timedtext_parsing() {
        let fetcher = TimedTextFetcher::new(Client::new());
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<transcript>
  <text start="9.64" dur="2.72">Guten Morgen allerseits</text>
  <text start="12.4">Wie geht&#39;s euch &amp; Co?</text>
</transcript>"#;

        let segments = fetcher.parse(body);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].offset_ms, 9_640);
        assert_eq!(segments[0].duration_ms, 2_720);
        assert_eq!(segments[1].duration_ms, DEFAULT_SEGMENT_DURATION_MS);
        assert_eq!(segments[1].text, "Wie geht's euch & Co?");
    }

    #[test]
    fn test_parse_sorts_by_offset() {
        let fetcher = TimedTextFetcher::new(Client::new());
        let body = r#"<text start="5.0" dur="1.0">zwei</text><text start="1.0" dur="1.0">eins</text>"#;
        let segments = fetcher.parse(body);
        assert_eq!(segments[0].text, "eins");
        assert_eq!(segments[1].text, "zwei");
    }
}
