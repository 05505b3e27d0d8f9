//! The orchestrator: drives both discovery passes, owns pacing and failure
//! isolation, and is the only owner of the in-memory index during a run.
//!
//! All external calls are awaited sequentially: the search, metadata and
//! transcript endpoints share one quota budget per credential, and parallel
//! fan-out would burst past it. Per-item failures (a dead channel, a video
//! without captions, a throttled search) never escape their item; only a
//! missing credential or a corrupt index file aborts the run.

use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::catalog::{self, Phrase};
use crate::config::{Config, PacingConfig};
use crate::error::{IndexerError, Result};
use crate::index::{ClipCandidate, IndexStore, PhraseIndex};
use crate::transcript::{scan_segments, TimedTextFetcher, TranscriptFetcher};
use crate::youtube::{http_client, DataApiClient, VideoApi, VideoMetadata};

/// Aggregate counters for one run, logged at completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub phrases_total: usize,
    pub phrases_at_cap: usize,
    pub candidates_added: usize,
    pub channels_scanned: usize,
    pub searches_issued: usize,
    pub transcripts_fetched: usize,
    pub transcripts_missing: usize,
}

/// Retry an external call with bounded exponential backoff and jitter.
///
/// Only transient failures (timeouts, connection errors, 429/5xx) are
/// retried; anything else surfaces immediately.
pub async fn with_backoff<T, F, Fut>(pacing: &PacingConfig, what: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay_ms = pacing.backoff_base_ms;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < pacing.max_attempts => {
                let jitter = rand::thread_rng().gen_range(0..=delay_ms / 2);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {} ms: {}",
                    what,
                    attempt,
                    pacing.max_attempts,
                    delay_ms + jitter,
                    e
                );
                sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = delay_ms.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Batch indexer over phrases × channels × (channel pass, fallback pass).
pub struct Indexer {
    config: Config,
    api: Box<dyn VideoApi>,
    transcripts: Box<dyn TranscriptFetcher>,
}

impl Indexer {
    pub fn new(
        config: Config,
        api: Box<dyn VideoApi>,
        transcripts: Box<dyn TranscriptFetcher>,
    ) -> Self {
        Self {
            config,
            api,
            transcripts,
        }
    }

    /// Wire up the live Data API and timedtext clients, sharing one HTTP
    /// client, with the quota credential from the environment.
    pub fn with_live_api(config: Config, api_key: String) -> Self {
        let client = http_client(config.api.request_timeout_secs);
        let api = DataApiClient::new(client.clone(), api_key, config.api.language.clone());
        let transcripts = TimedTextFetcher::new(client);
        Self::new(config, Box::new(api), Box::new(transcripts))
    }

    /// Execute one full run: load, channel pass, fallback pass, persist.
    pub async fn run(&self) -> Result<RunReport> {
        let store = IndexStore::new(self.config.catalog.index_path.clone());
        let mut index = store.load()?;

        let phrases = self.load_phrase_catalog(&index)?;
        let channels = self.load_channel_catalog();

        let mut report = RunReport {
            phrases_total: phrases.len(),
            ..RunReport::default()
        };

        if phrases.is_empty() {
            warn!("No phrases to index; writing index through unchanged");
            store.save(&index)?;
            return Ok(report);
        }

        info!(
            "Indexing {} phrases against {} trusted channels (cap {})",
            phrases.len(),
            channels.len(),
            self.config.matching.max_candidates
        );

        self.channel_pass(&mut index, &phrases, &channels, &mut report)
            .await;
        self.fallback_pass(&mut index, &phrases, &mut report).await;

        store.save(&index)?;

        let cap = self.config.matching.max_candidates;
        report.phrases_at_cap = phrases
            .iter()
            .filter(|p| index.at_cap(&p.key, cap))
            .count();
        Ok(report)
    }

    fn load_phrase_catalog(&self, index: &PhraseIndex) -> Result<Vec<Phrase>> {
        let path = &self.config.catalog.phrases_path;
        match catalog::load_phrases(path) {
            Ok(phrases) => Ok(phrases),
            Err(IndexerError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Phrase catalog {} not found; deriving {} phrases from existing index keys",
                    path.display(),
                    index.len()
                );
                Ok(catalog::phrases_from_index(index))
            }
            Err(e) => Err(e),
        }
    }

    /// The channel catalog is optional and never fatal: a missing or broken
    /// file just skips the channel pass.
    fn load_channel_catalog(&self) -> Vec<String> {
        let Some(path) = &self.config.catalog.channels_path else {
            return Vec::new();
        };
        match catalog::load_channels(path) {
            Ok(channels) => channels,
            Err(e) => {
                warn!(
                    "Skipping channel pass, could not load {}: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Pass one: scan recent uploads of each trusted channel for every
    /// phrase still under its quota ceiling. Channel curation is treated as
    /// a quality prior, so these candidates land ahead of search results.
    async fn channel_pass(
        &self,
        index: &mut PhraseIndex,
        phrases: &[Phrase],
        channels: &[String],
        report: &mut RunReport,
    ) {
        let cap = self.config.matching.max_candidates;

        for channel_id in channels {
            if phrases.iter().all(|p| index.at_cap(&p.key, cap)) {
                info!("All phrases at quota, ending channel pass early");
                break;
            }

            let uploads = match with_backoff(&self.config.pacing, "uploads resolution", || {
                self.api
                    .resolve_uploads(channel_id, self.config.pacing.uploads_per_channel)
            })
            .await
            {
                Ok(uploads) => uploads,
                Err(e) => {
                    warn!("Skipping channel {}: {}", channel_id, e);
                    continue;
                }
            };
            if uploads.is_empty() {
                debug!("Channel {} has no uploads, skipping", channel_id);
                continue;
            }
            report.channels_scanned += 1;

            let metadata = self.metadata_or_unknown(&uploads).await;

            for phrase in phrases {
                if index.at_cap(&phrase.key, cap) {
                    continue;
                }
                let needle = phrase.needle();

                for video_id in &uploads {
                    if index.at_cap(&phrase.key, cap) {
                        break;
                    }
                    if index.has_video(&phrase.key, video_id) {
                        continue;
                    }
                    if let Some(candidate) = self
                        .scan_video(video_id, &needle, metadata.get(video_id), report)
                        .await
                    {
                        info!(
                            "Found clip for {:?} in channel video {} [{}-{}s]",
                            phrase.text, video_id, candidate.start_sec, candidate.end_sec
                        );
                        report.candidates_added += index.merge(&phrase.key, vec![candidate], cap);
                    }
                }
            }
        }
    }

    /// Pass two: general keyword search for phrases still under quota,
    /// exact quoted query first, then relaxed. Every external call here is
    /// preceded by the fixed pacing delay.
    async fn fallback_pass(
        &self,
        index: &mut PhraseIndex,
        phrases: &[Phrase],
        report: &mut RunReport,
    ) {
        let cap = self.config.matching.max_candidates;
        let limit = self.config.pacing.fallback_candidate_limit;

        for phrase in phrases {
            if index.at_cap(&phrase.key, cap) {
                continue;
            }
            let needle = phrase.needle();

            let queries = [format!("\"{}\"", phrase.text), phrase.text.clone()];
            let mut candidates: Vec<String> = Vec::new();

            for query in &queries {
                if candidates.len() >= limit {
                    break;
                }
                self.pace().await;
                report.searches_issued += 1;
                match with_backoff(&self.config.pacing, "video search", || {
                    self.api
                        .search_videos(query, self.config.api.search_page_size)
                })
                .await
                {
                    Ok(found) => {
                        for id in found {
                            if !candidates.contains(&id) {
                                candidates.push(id);
                            }
                        }
                    }
                    Err(e) => warn!("Search {:?} failed: {}", query, e),
                }
            }
            candidates.truncate(limit);

            if candidates.is_empty() {
                info!("No search candidates for {:?}", phrase.text);
                continue;
            }

            self.pace().await;
            let metadata = self.metadata_or_unknown(&candidates).await;

            for video_id in &candidates {
                if index.at_cap(&phrase.key, cap) {
                    break;
                }
                if index.has_video(&phrase.key, video_id) {
                    continue;
                }
                self.pace().await;
                if let Some(candidate) = self
                    .scan_video(video_id, &needle, metadata.get(video_id), report)
                    .await
                {
                    info!(
                        "Found clip for {:?} via search in {} [{}-{}s]",
                        phrase.text, video_id, candidate.start_sec, candidate.end_sec
                    );
                    report.candidates_added += index.merge(&phrase.key, vec![candidate], cap);
                }
            }

            if !index.at_cap(&phrase.key, cap) {
                info!(
                    "Phrase {:?} finished with {}/{} candidates",
                    phrase.text,
                    index.candidates(&phrase.key).len(),
                    cap
                );
            }
        }
    }

    /// Fetch metadata for display and dedupe; a failure here degrades to
    /// "metadata unknown" rather than skipping the videos.
    async fn metadata_or_unknown(&self, video_ids: &[String]) -> HashMap<String, VideoMetadata> {
        match with_backoff(&self.config.pacing, "metadata fetch", || {
            self.api.fetch_metadata(video_ids)
        })
        .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Metadata fetch failed, continuing without: {}", e);
                HashMap::new()
            }
        }
    }

    /// Fetch and scan one video's transcript for one phrase. Any failure is
    /// a per-video skip.
    async fn scan_video(
        &self,
        video_id: &str,
        needle: &str,
        meta: Option<&VideoMetadata>,
        report: &mut RunReport,
    ) -> Option<ClipCandidate> {
        let segments = match self
            .transcripts
            .fetch(video_id, &self.config.api.language)
            .await
        {
            Ok(segments) => {
                report.transcripts_fetched += 1;
                segments
            }
            Err(IndexerError::TranscriptUnavailable { .. }) => {
                report.transcripts_missing += 1;
                debug!("No transcript for {}", video_id);
                return None;
            }
            Err(e) => {
                report.transcripts_missing += 1;
                warn!("Transcript fetch for {} failed: {}", video_id, e);
                return None;
            }
        };

        match scan_segments(
            video_id,
            &segments,
            needle,
            meta,
            self.config.matching.threshold,
            self.config.matching.policy,
        ) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Skipping scan of {}: {}", video_id, e);
                None
            }
        }
    }

    async fn pace(&self) {
        let delay = self.config.pacing.search_delay_ms;
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }
    }
}
