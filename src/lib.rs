/// Phrase-to-Video-Clip Indexer
///
/// Batch pipeline that discovers YouTube clips in which catalog phrases are
/// actually spoken, extracts a padded timestamp window plus surrounding
/// spoken context, and persists a ranked phrase → clip-candidate index
/// consumed by the front end.
pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod matching;
pub mod normalize;
pub mod pipeline;
pub mod rank;
pub mod transcript;
pub mod youtube;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::error::IndexerError;
pub use crate::index::{ClipCandidate, IndexStore, PhraseIndex};
pub use crate::matching::MatchPolicy;
pub use crate::pipeline::{Indexer, RunReport};
pub use crate::transcript::{TranscriptFetcher, TranscriptSegment};
pub use crate::youtube::{VideoApi, VideoMetadata};
