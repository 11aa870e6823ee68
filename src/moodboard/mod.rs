//! Core moodboard data model.
//!
//! A moodboard is assembled from the output of three independent providers:
//! a poetic caption, a playlist of up to [`PLAYLIST_LIMIT`] tracks and a set
//! of up to [`IMAGE_SET_SIZE`] image URLs. The types here are the contract
//! between the orchestrator, the HTTP surface and the share store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of tracks in a moodboard playlist.
pub const PLAYLIST_LIMIT: usize = 6;

/// Number of images requested per moodboard.
pub const IMAGE_SET_SIZE: usize = 4;

/// Maximum accepted length of a mood description, in characters.
pub const MOOD_MAX_CHARS: usize = 500;

/// Album used for tracks the catalog could not resolve.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Duration used for tracks the catalog could not resolve.
pub const DEFAULT_DURATION: &str = "3:30";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoodError {
    #[error("mood description must not be empty")]
    Empty,
}

/// Raw user-supplied mood text.
///
/// Preserved verbatim (no trimming or normalization) apart from a clamp to
/// [`MOOD_MAX_CHARS`] characters. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoodDescription(String);

impl MoodDescription {
    pub fn new(input: &str) -> Result<Self, MoodError> {
        if input.is_empty() {
            return Err(MoodError::Empty);
        }
        if input.chars().count() > MOOD_MAX_CHARS {
            return Ok(Self(input.chars().take(MOOD_MAX_CHARS).collect()));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MoodDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A playlist entry.
///
/// Either catalog-resolved (catalog fields present) or provider-suggested
/// (catalog fields absent). Tracks are positional list members; duplicates
/// are permitted and no identity is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub album: String,
    /// Formatted as `m:ss`.
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl Track {
    /// Build a provider-suggested track from a completion candidate, filling
    /// the album and duration placeholders where the provider omitted them.
    pub fn from_candidate(candidate: &TrackCandidate) -> Self {
        Self {
            name: candidate.name.clone(),
            artist: candidate.artist.clone(),
            album: candidate
                .album
                .clone()
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            duration: candidate
                .duration
                .clone()
                .unwrap_or_else(|| DEFAULT_DURATION.to_string()),
            catalog_url: None,
            catalog_id: None,
            preview_url: None,
        }
    }
}

/// A track suggested by the completion provider, prior to catalog resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCandidate {
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Structured interpretation of a mood, produced once per submission by the
/// completion provider and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub poetic_caption: String,
    /// 3-5 word free-text query for the music catalog.
    pub catalog_query: String,
    /// Prompt handed to the image generation provider.
    pub image_prompt: String,
    pub suggested_tracks: Vec<TrackCandidate>,
}

/// The composite artifact the pipeline exists to produce.
///
/// Always fully formed: in the worst case the playlist and images are filled
/// from fallback content rather than left empty. Playlist and image order is
/// meaningful and must survive serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodboardResult {
    pub original_mood: MoodDescription,
    pub poetic_caption: String,
    pub playlist: Vec<Track>,
    pub images: Vec<String>,
}

impl MoodboardResult {
    /// Static moodboard served for UX continuity when creation fails
    /// entirely. Fully formed: a caption, six tracks and four images.
    pub fn fallback() -> Self {
        let track = |name: &str, artist: &str, album: &str, duration: &str| Track {
            name: name.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            duration: duration.to_string(),
            catalog_url: None,
            catalog_id: None,
            preview_url: None,
        };
        Self {
            original_mood: MoodDescription(
                "I feel nostalgic, like missing someone I never knew".to_string(),
            ),
            poetic_caption: "You're dancing with shadows of memories that were never yours, \
                             wrapped in the golden hour of emotions that exist somewhere between \
                             dreams and reality. There's beauty in this bittersweet ache."
                .to_string(),
            playlist: vec![
                track("Holocene", "Bon Iver", "Bon Iver, Bon Iver", "5:36"),
                track("Mad World", "Gary Jules", "Donnie Darko Soundtrack", "3:07"),
                track("The Night We Met", "Lord Huron", "Strange Trails", "3:28"),
                track("Skinny Love", "Bon Iver", "For Emma, Forever Ago", "3:58"),
                track("Hurt", "Johnny Cash", "American IV", "3:38"),
                track("Black", "Pearl Jam", "Ten", "5:43"),
            ],
            images: crate::providers::images::fallback_images(),
        }
    }
}

/// A persisted moodboard, retrieved by its share slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedMoodboard {
    pub id: String,
    #[serde(flatten)]
    pub board: MoodboardResult,
    /// Incremented exactly once per successful retrieval.
    pub view_count: u32,
    pub created_at: DateTime<Utc>,
}
