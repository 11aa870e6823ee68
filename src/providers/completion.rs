//! Completion provider client.
//!
//! Sends a mood description to an OpenAI-compatible chat completion endpoint
//! and parses the reply into a [`CompletionResult`]. The remote model may
//! wrap its JSON answer in prose or code fences, so the content goes through
//! [`extract_json_object`] before parsing. A single attempt is made; retry
//! policy belongs to the caller.

use super::{transport_error, MalformedResponse, ProviderError};
use crate::config::CompletionSettings;
use crate::moodboard::{CompletionResult, MoodDescription, TrackCandidate};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an empathetic AI that creates beautiful, poetic \
    interpretations of human emotions and suggests matching music and art. Always respond \
    with valid JSON only.";

/// Trait for mood analysis backends.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait MoodAnalyzer: Send + Sync {
    /// Whether a credential is available. Absence means graceful degradation
    /// at call time, not startup failure.
    fn is_configured(&self) -> bool;

    /// Interpret a mood into a caption, a catalog query, an image prompt and
    /// a list of suggested tracks. Single attempt, no retry.
    async fn analyze(&self, mood: &MoodDescription) -> Result<CompletionResult, ProviderError>;
}

/// OpenAI-backed mood analyzer.
pub struct OpenAiAnalyzer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiAnalyzer {
    pub fn from_settings(settings: &CompletionSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.clone(),
            api_key: settings.resolved_api_key(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    fn build_prompt(mood: &MoodDescription) -> String {
        format!(
            r#"You are a highly empathetic AI that understands human emotions deeply. A user has described their current mood as: "{mood}"

Please respond with a JSON object containing:

1. "poeticCaption": A beautiful, poetic 1-2 sentence interpretation of their mood. Write like you're their inner voice - empathetic, understanding, and slightly poetic. Capture the essence and beauty in their feeling.

2. "spotifyQuery": A search query string that would help find music matching this exact emotional state (3-5 words max, like "melancholy indie acoustic" or "upbeat nostalgic pop")

3. "visualPrompt": A detailed prompt for AI image generation that would create abstract, dreamy artwork representing this mood. Include colors, textures, lighting, and artistic style. Make it ethereal and emotional.

4. "suggestedTracks": An array of exactly 6 real songs that perfectly match this mood. Each song should be an object with "name", "artist", "album", and "duration" fields. Use exact song names and artists that exist.

IMPORTANT:
- Respond only with valid JSON, no other text
- Escape all quotes properly in strings
- Do not use trailing commas
- Ensure all strings are properly quoted
- Make sure the JSON is complete and valid

Example format:
{{
  "poeticCaption": "Your emotions are like...",
  "spotifyQuery": "dreamy indie folk",
  "visualPrompt": "Ethereal landscape with...",
  "suggestedTracks": [
    {{
      "name": "Song Name",
      "artist": "Artist Name",
      "album": "Album Name",
      "duration": "3:45"
    }}
  ]
}}"#
        )
    }
}

#[async_trait]
impl MoodAnalyzer for OpenAiAnalyzer {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn analyze(&self, mood: &MoodDescription) -> Result<CompletionResult, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_prompt(mood),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, "Sending mood analysis request");

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

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(MalformedResponse::MissingContent)?;

        debug!(content_len = content.len(), "Received mood analysis response");

        Ok(parse_completion(&content)?)
    }
}

/// Extract the JSON object embedded in a possibly prose-wrapped model reply.
///
/// Strips markdown code fences, then takes the substring between the first
/// `{` and the last `}`. Missing either brace is a hard
/// [`MalformedResponse::NoJsonObject`]; partial braces are never guessed at.
pub(crate) fn extract_json_object(content: &str) -> Result<String, MalformedResponse> {
    let cleaned = content.trim().replace("```json", "").replace("```", "");

    let first = cleaned.find('{').ok_or(MalformedResponse::NoJsonObject)?;
    let last = cleaned.rfind('}').ok_or(MalformedResponse::NoJsonObject)?;
    if last < first {
        return Err(MalformedResponse::NoJsonObject);
    }

    Ok(cleaned[first..=last].to_string())
}

/// Parse and validate completion message content into a [`CompletionResult`].
///
/// All four fields are required; every missing or mistyped field is reported,
/// not just the first. An empty track list is a hard failure.
pub(crate) fn parse_completion(content: &str) -> Result<CompletionResult, MalformedResponse> {
    let json = extract_json_object(content)?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;

    fn string_field(value: &Value, name: &str, missing: &mut Vec<String>) -> String {
        match value.get(name).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        }
    }

    let mut missing = Vec::new();
    let poetic_caption = string_field(&value, "poeticCaption", &mut missing);
    let catalog_query = string_field(&value, "spotifyQuery", &mut missing);
    let image_prompt = string_field(&value, "visualPrompt", &mut missing);
    let tracks_value = match value.get("suggestedTracks").and_then(Value::as_array) {
        Some(tracks) => Some(tracks.clone()),
        None => {
            missing.push("suggestedTracks".to_string());
            None
        }
    };

    if !missing.is_empty() {
        return Err(MalformedResponse::MissingFields(missing));
    }

    let suggested_tracks: Vec<TrackCandidate> =
        serde_json::from_value(Value::Array(tracks_value.unwrap_or_default()))
            .map_err(|e| MalformedResponse::InvalidTracks(e.to_string()))?;

    if suggested_tracks.is_empty() {
        return Err(MalformedResponse::EmptyTracks);
    }

    Ok(CompletionResult {
        poetic_caption,
        catalog_query,
        image_prompt,
        suggested_tracks,
    })
}

// OpenAI chat completion API types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_PAYLOAD: &str = r#"{
        "poeticCaption": "Your heart hums in amber light.",
        "spotifyQuery": "warm nostalgic folk",
        "visualPrompt": "Golden hour haze over a quiet field, soft film grain.",
        "suggestedTracks": [
            {"name": "Holocene", "artist": "Bon Iver", "album": "Bon Iver, Bon Iver", "duration": "5:36"},
            {"name": "Mad World", "artist": "Gary Jules"}
        ]
    }"#;

    #[test]
    fn test_extract_plain_object() {
        let out = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(out, r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_prose_wrapped() {
        let out = extract_json_object("Here is your JSON:\n{\"a\": 1}\nHope that helps!").unwrap();
        assert_eq!(out, r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_code_fenced() {
        let out = extract_json_object("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(out.trim(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_no_opening_brace() {
        assert_eq!(
            extract_json_object("no json here}"),
            Err(MalformedResponse::NoJsonObject)
        );
    }

    #[test]
    fn test_extract_no_closing_brace() {
        assert_eq!(
            extract_json_object("{\"a\": 1"),
            Err(MalformedResponse::NoJsonObject)
        );
    }

    #[test]
    fn test_extract_reversed_braces() {
        assert_eq!(
            extract_json_object("} backwards {"),
            Err(MalformedResponse::NoJsonObject)
        );
    }

    #[test]
    fn test_parse_valid_payload() {
        let result = parse_completion(VALID_PAYLOAD).unwrap();
        assert_eq!(result.poetic_caption, "Your heart hums in amber light.");
        assert_eq!(result.catalog_query, "warm nostalgic folk");
        assert_eq!(result.suggested_tracks.len(), 2);
        assert_eq!(result.suggested_tracks[1].album, None);
    }

    #[test]
    fn test_parse_fenced_payload() {
        let fenced = format!("```json\n{VALID_PAYLOAD}\n```");
        assert!(parse_completion(&fenced).is_ok());
    }

    #[test]
    fn test_parse_enumerates_all_missing_fields() {
        let err = parse_completion(r#"{"spotifyQuery": "ambient drone"}"#).unwrap_err();
        assert_eq!(
            err,
            MalformedResponse::MissingFields(vec![
                "poeticCaption".to_string(),
                "visualPrompt".to_string(),
                "suggestedTracks".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_rejects_wrongly_typed_field() {
        let err = parse_completion(
            r#"{"poeticCaption": 42, "spotifyQuery": "x", "visualPrompt": "y", "suggestedTracks": []}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            MalformedResponse::MissingFields(vec!["poeticCaption".to_string()])
        );
    }

    #[test]
    fn test_parse_rejects_empty_tracks() {
        let err = parse_completion(
            r#"{"poeticCaption": "a", "spotifyQuery": "b", "visualPrompt": "c", "suggestedTracks": []}"#,
        )
        .unwrap_err();
        assert_eq!(err, MalformedResponse::EmptyTracks);
    }

    #[test]
    fn test_parse_rejects_track_entries_without_name() {
        let err = parse_completion(
            r#"{"poeticCaption": "a", "spotifyQuery": "b", "visualPrompt": "c",
               "suggestedTracks": [{"artist": "Bon Iver"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MalformedResponse::InvalidTracks(_)));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_completion("{not json}").unwrap_err();
        assert!(matches!(err, MalformedResponse::InvalidJson(_)));
    }

    #[test]
    fn test_prompt_embeds_mood() {
        let mood = MoodDescription::new("quietly electric").unwrap();
        let prompt = OpenAiAnalyzer::build_prompt(&mood);
        assert!(prompt.contains("\"quietly electric\""));
        assert!(prompt.contains("suggestedTracks"));
    }
}
