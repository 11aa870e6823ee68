//! Moodboard orchestration.
//!
//! Sequences the three provider clients and assembles the composite result.
//! The completion step gates the whole pipeline; catalog and image failures
//! are absorbed into well-defined fallbacks and logged, never surfaced. A
//! degraded moodboard is indistinguishable from a fully-succeeded one at the
//! data-model level.

use crate::moodboard::{
    CompletionResult, MoodDescription, MoodboardResult, Track, IMAGE_SET_SIZE, PLAYLIST_LIMIT,
};
use crate::providers::images::fallback_images;
use crate::providers::{ImageGenerator, MoodAnalyzer, ProviderError, TrackCatalog};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced past the orchestrator boundary. Only the completion stage
/// can fail the pipeline.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("mood analysis failed: {0}")]
    Completion(#[source] ProviderError),
}

/// Which providers currently hold credentials.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProviderStatus {
    pub completion: bool,
    pub catalog: bool,
    pub images: bool,
}

/// Assembles moodboards from the three provider clients.
///
/// Clients are injected so tests can substitute fakes.
pub struct MoodboardManager {
    analyzer: Arc<dyn MoodAnalyzer>,
    catalog: Arc<dyn TrackCatalog>,
    images: Arc<dyn ImageGenerator>,
}

impl MoodboardManager {
    pub fn new(
        analyzer: Arc<dyn MoodAnalyzer>,
        catalog: Arc<dyn TrackCatalog>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            analyzer,
            catalog,
            images,
        }
    }

    pub fn provider_status(&self) -> ProviderStatus {
        ProviderStatus {
            completion: self.analyzer.is_configured(),
            catalog: self.catalog.is_configured(),
            images: self.images.is_configured(),
        }
    }

    /// Create a moodboard for `mood`.
    ///
    /// Step 1 (completion) blocks the rest; steps 2 (playlist) and 3 (images)
    /// have no data dependency on each other and run concurrently.
    pub async fn create_moodboard(
        &self,
        mood: MoodDescription,
    ) -> Result<MoodboardResult, OrchestrationError> {
        let analysis = self
            .analyzer
            .analyze(&mood)
            .await
            .map_err(OrchestrationError::Completion)?;

        info!(
            query = %analysis.catalog_query,
            suggested = analysis.suggested_tracks.len(),
            "Mood analyzed"
        );

        let (playlist, images) = tokio::join!(
            self.build_playlist(&analysis),
            self.build_images(&analysis.image_prompt),
        );

        Ok(MoodboardResult {
            original_mood: mood,
            poetic_caption: analysis.poetic_caption,
            playlist,
            images,
        })
    }

    /// Resolve suggested tracks against the catalog, topping up with a
    /// free-text search when resolution comes back short. Any catalog
    /// failure degrades to the raw suggestions with placeholder fields.
    async fn build_playlist(&self, analysis: &CompletionResult) -> Vec<Track> {
        if !self.catalog.is_configured() {
            warn!("Catalog not configured, using suggested tracks");
            return placeholder_playlist(analysis);
        }

        let mut playlist = match self.catalog.resolve(&analysis.suggested_tracks).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!(error = %e, "Catalog resolution failed, using suggested tracks");
                return placeholder_playlist(analysis);
            }
        };

        if playlist.len() < PLAYLIST_LIMIT {
            let wanted = PLAYLIST_LIMIT - playlist.len();
            match self
                .catalog
                .search_tracks(&analysis.catalog_query, wanted)
                .await
            {
                Ok(more) => playlist.extend(more),
                Err(e) => {
                    warn!(error = %e, "Catalog query search failed, keeping short playlist");
                }
            }
        }

        playlist.truncate(PLAYLIST_LIMIT);
        playlist
    }

    /// Generate the image set, substituting the static fallback set when
    /// every attempt failed.
    async fn build_images(&self, prompt: &str) -> Vec<String> {
        match self.images.generate(prompt, IMAGE_SET_SIZE).await {
            Ok(urls) if !urls.is_empty() => urls,
            Ok(_) => {
                warn!("Image generation returned nothing, using fallback images");
                fallback_images()
            }
            Err(e) => {
                warn!(error = %e, "Image generation failed, using fallback images");
                fallback_images()
            }
        }
    }
}

fn placeholder_playlist(analysis: &CompletionResult) -> Vec<Track> {
    let mut playlist: Vec<Track> = analysis
        .suggested_tracks
        .iter()
        .map(Track::from_candidate)
        .collect();
    playlist.truncate(PLAYLIST_LIMIT);
    playlist
}
