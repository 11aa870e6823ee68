//! Image generation client.
//!
//! Issues up to [`crate::moodboard::IMAGE_SET_SIZE`] independent generation
//! requests against an OpenAI-compatible image endpoint, each with a distinct
//! style framing so the batch reads as a varied mood board rather than four
//! near-duplicates. Individual request failures are logged and swallowed; the
//! call as a whole fails only when every attempt failed.

use super::{transport_error, MalformedResponse, ProviderError};
use crate::config::ImageSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Style framings appended to the shared prompt, one per request.
const STYLE_PROMPTS: [(&str, &str); 4] = [
    (
        "lifestyle",
        "Pinterest-style lifestyle photography, aesthetic flat lay, cozy atmosphere, \
         natural lighting, real objects and spaces that evoke this mood.",
    ),
    (
        "nature",
        "Beautiful nature photography, landscapes, flowers, or natural scenes that capture \
         this emotional feeling. Pinterest aesthetic, high quality photography.",
    ),
    (
        "interior",
        "Aesthetic interior design, cozy spaces, room decor, or architectural details that \
         reflect this mood. Pinterest home decor style, warm and inviting.",
    ),
    (
        "fashion",
        "Fashion photography, outfit styling, accessories, or beauty shots that embody this \
         emotional state. Pinterest fashion aesthetic, stylish and mood-driven.",
    ),
];

const FALLBACK_IMAGE_URLS: [&str; 4] = [
    "https://images.unsplash.com/photo-1518837695005-2083093ee35b?w=400&h=400&fit=crop&crop=center",
    "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=400&h=400&fit=crop&crop=center",
    "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=400&h=400&fit=crop&crop=center",
    "https://images.unsplash.com/photo-1511593358241-7eea1f3c84e5?w=400&h=400&fit=crop&crop=center",
];

/// Static image set substituted when generation fails entirely.
pub fn fallback_images() -> Vec<String> {
    FALLBACK_IMAGE_URLS.iter().map(|s| s.to_string()).collect()
}

/// Trait for image generation backends.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Generate up to `count` style-varied images for `prompt`. Returns a
    /// shorter list when some attempts failed; [`ProviderError::NoImagesGenerated`]
    /// only when all of them did. Callers must treat a short list as success.
    async fn generate(&self, prompt: &str, count: usize) -> Result<Vec<String>, ProviderError>;
}

/// OpenAI image endpoint client.
pub struct OpenAiImageGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    size: String,
    request_delay: Duration,
    timeout: Duration,
}

impl OpenAiImageGenerator {
    pub fn from_settings(settings: &ImageSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.clone(),
            api_key: settings.resolved_api_key(),
            model: settings.model.clone(),
            size: settings.size.clone(),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    async fn generate_one(&self, api_key: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/images/generations", self.base_url);
        let request = ImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.size.clone(),
            quality: "standard".to_string(),
            style: "natural".to_string(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let image_response: ImageResponse = response
            .json()
            .await
            .map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;

        image_response
            .data
            .into_iter()
            .next()
            .map(|d| d.url)
            .ok_or_else(|| {
                MalformedResponse::InvalidJson("image response has no data entries".to_string())
                    .into()
            })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str, count: usize) -> Result<Vec<String>, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;

        let count = count.min(STYLE_PROMPTS.len());
        let mut urls = Vec::with_capacity(count);

        for (i, (style_name, style_suffix)) in STYLE_PROMPTS.iter().take(count).enumerate() {
            let styled = styled_prompt(prompt, style_suffix);
            match self.generate_one(api_key, &styled).await {
                Ok(url) => {
                    debug!(style = style_name, "Generated image");
                    urls.push(url);
                }
                Err(e) => {
                    warn!(style = style_name, error = %e, "Image generation attempt failed");
                }
            }

            // Politeness delay between generation requests.
            if i + 1 < count {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        if urls.is_empty() {
            return Err(ProviderError::NoImagesGenerated);
        }
        Ok(urls)
    }
}

fn styled_prompt(prompt: &str, style_suffix: &str) -> String {
    format!("{prompt}. {style_suffix}")
}

// OpenAI image API types

#[derive(Debug, Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    quality: String,
    style: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles_are_distinct() {
        let names: Vec<&str> = STYLE_PROMPTS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["lifestyle", "nature", "interior", "fashion"]);
        for window in STYLE_PROMPTS.windows(2) {
            assert_ne!(window[0].1, window[1].1);
        }
    }

    #[test]
    fn test_styled_prompt_appends_framing() {
        let styled = styled_prompt("amber dusk haze", STYLE_PROMPTS[1].1);
        assert!(styled.starts_with("amber dusk haze. "));
        assert!(styled.contains("nature photography"));
    }

    #[test]
    fn test_fallback_images_fixed_set() {
        let images = fallback_images();
        assert_eq!(images.len(), 4);
        assert!(images.iter().all(|url| url.starts_with("https://images.unsplash.com/")));
    }

    #[tokio::test]
    async fn test_generate_unconfigured() {
        let generator = OpenAiImageGenerator::from_settings(&ImageSettings::default());
        assert!(!generator.is_configured());
        let err = generator.generate("anything", 4).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unconfigured));
    }
}
