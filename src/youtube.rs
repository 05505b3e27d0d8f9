//! YouTube Data API v3 client: channel upload resolution, batched video
//! metadata and keyword search.
//!
//! Everything here is behind the [`VideoApi`] trait so the pipeline can be
//! exercised against stub implementations with call counting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

/// The API caps `videos.list` at 50 IDs per call; inputs are chunked.
pub const METADATA_BATCH_SIZE: usize = 50;

/// Page size for upload playlist walks.
const PLAYLIST_PAGE_SIZE: usize = 50;

/// Display and dedupe metadata for one video. Immutable once fetched;
/// cached per run to avoid duplicate calls.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u64,
}

/// External video platform surface used by the pipeline.
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Keyword search returning video IDs, bounded by `max`.
    async fn search_videos(&self, query: &str, max: usize) -> Result<Vec<String>>;

    /// Recent upload video IDs for a channel, paginated up to `max`.
    /// A broken or deleted channel yields an empty list, not an error.
    async fn resolve_uploads(&self, channel_id: &str, max: usize) -> Result<Vec<String>>;

    /// Batch metadata fetch. Videos that no longer exist are simply absent
    /// from the map; a missing entry means "metadata unknown".
    async fn fetch_metadata(&self, video_ids: &[String]) -> Result<HashMap<String, VideoMetadata>>;
}

/// `VideoApi` implementation against the Data API v3, keyed by one quota-
/// limited credential.
pub struct DataApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    relevance_language: String,
}

/// Shared HTTP client with the timeout and user agent all API calls use.
pub fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("phrase-clip-indexer/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl DataApiClient {
    pub fn new(client: Client, api_key: String, relevance_language: String) -> Self {
        Self::with_base_url(
            client,
            api_key,
            relevance_language,
            "https://www.googleapis.com/youtube/v3".to_string(),
        )
    }

    pub fn with_base_url(
        client: Client,
        api_key: String,
        relevance_language: String,
        base_url: String,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url,
            relevance_language,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    /// Resolve a channel's uploads playlist ID, or `None` for channels that
    /// no longer expose one.
    async fn uploads_playlist(&self, channel_id: &str) -> Result<Option<String>> {
        let response: ChannelsResponse = self
            .get_json(
                "channels",
                &[("part", "contentDetails"), ("id", channel_id)],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.content_details.related_playlists.uploads))
    }
}

#[async_trait]
impl VideoApi for DataApiClient {
    async fn search_videos(&self, query: &str, max: usize) -> Result<Vec<String>> {
        let max_results = max.min(50).to_string();
        let response: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("part", "id"),
                    ("type", "video"),
                    ("videoCaption", "closedCaption"),
                    ("relevanceLanguage", self.relevance_language.as_str()),
                    ("maxResults", max_results.as_str()),
                    ("q", query),
                ],
            )
            .await?;

        let ids: Vec<String> = response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();
        debug!("Search {:?} returned {} video IDs", query, ids.len());
        Ok(ids)
    }

    async fn resolve_uploads(&self, channel_id: &str, max: usize) -> Result<Vec<String>> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let playlist_id = match self.uploads_playlist(channel_id).await? {
            Some(id) => id,
            None => {
                warn!("Channel {} has no resolvable uploads playlist", channel_id);
                return Ok(Vec::new());
            }
        };

        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_size = PLAYLIST_PAGE_SIZE.min(max - video_ids.len()).to_string();
            let mut params = vec![
                ("part", "contentDetails"),
                ("playlistId", playlist_id.as_str()),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(ref token) = page_token {
                params.push(("pageToken", token.as_str()));
            }

            let response: PlaylistItemsResponse =
                self.get_json("playlistItems", &params).await?;

            video_ids.extend(
                response
                    .items
                    .into_iter()
                    .map(|item| item.content_details.video_id),
            );

            page_token = response.next_page_token;
            if video_ids.len() >= max || page_token.is_none() {
                break;
            }
        }

        video_ids.truncate(max);
        debug!(
            "Resolved {} uploads for channel {}",
            video_ids.len(),
            channel_id
        );
        Ok(video_ids)
    }

    async fn fetch_metadata(&self, video_ids: &[String]) -> Result<HashMap<String, VideoMetadata>> {
        let mut metadata = HashMap::with_capacity(video_ids.len());

        for chunk in video_ids.chunks(METADATA_BATCH_SIZE) {
            let ids = chunk.join(",");
            let response: VideosResponse = self
                .get_json(
                    "videos",
                    &[("part", "snippet,statistics"), ("id", ids.as_str())],
                )
                .await?;

            for item in response.items {
                metadata.insert(item.id.clone(), item.into_metadata());
            }
        }

        debug!(
            "Fetched metadata for {} of {} videos",
            metadata.len(),
            video_ids.len()
        );
        Ok(metadata)
    }
}

// Data API response shapes, reduced to the fields actually consumed.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    // The API serializes counters as strings.
    view_count: Option<String>,
}

impl VideoItem {
    fn into_metadata(self) -> VideoMetadata {
        let snippet = self.snippet.unwrap_or(VideoSnippet {
            title: String::new(),
            channel_title: String::new(),
            thumbnails: Thumbnails::default(),
            published_at: None,
        });
        let thumbnail_url = snippet
            .thumbnails
            .medium
            .or(snippet.thumbnails.default)
            .map(|t| t.url)
            .unwrap_or_default();
        let view_count = self
            .statistics
            .and_then(|s| s.view_count)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        VideoMetadata {
            id: self.id,
            title: snippet.title,
            channel: snippet.channel_title,
            thumbnail_url,
            published_at: snippet.published_at,
            view_count,
        }
    }
}
