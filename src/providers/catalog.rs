//! Catalog lookup client.
//!
//! Resolves completion-suggested tracks against the Spotify catalog using
//! the client-credentials flow. A candidate that cannot be resolved degrades
//! to a provider-suggested [`Track`] with placeholder album and duration;
//! only search calls that fail wholesale (auth, non-success status) surface
//! a [`ProviderError`].

use super::{transport_error, MalformedResponse, ProviderError};
use crate::config::CatalogSettings;
use crate::moodboard::{Track, TrackCandidate};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Tokens are refreshed this long before their advertised expiry, so an
/// in-flight request never carries a token about to lapse.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Trait for music catalog backends.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Resolve candidates against the catalog, one lookup per candidate.
    /// A candidate miss or per-lookup error degrades to a placeholder track;
    /// the call fails only when no credential is configured.
    async fn resolve(&self, candidates: &[TrackCandidate]) -> Result<Vec<Track>, ProviderError>;

    /// Free-text track search. Zero results is a normal success with an
    /// empty list; auth failures and non-success statuses are hard errors.
    async fn search_tracks(&self, query: &str, limit: usize)
        -> Result<Vec<Track>, ProviderError>;
}

/// A bearer token with its refresh deadline.
#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub(crate) fn new(token: String, expires_in_secs: i64, now: DateTime<Utc>) -> Self {
        Self {
            token,
            expires_at: now
                + ChronoDuration::seconds(expires_in_secs - TOKEN_EXPIRY_MARGIN_SECS),
        }
    }

    pub(crate) fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

struct ClientCredentials {
    client_id: String,
    client_secret: String,
}

/// Spotify-backed track catalog.
pub struct SpotifyCatalog {
    client: Client,
    auth_url: String,
    api_url: String,
    credentials: Option<ClientCredentials>,
    // Concurrent lookups share the cached token; a refresh swaps the cache
    // entry while in-flight requests keep their own cloned bearer string.
    token: Arc<Mutex<Option<CachedToken>>>,
    lookup_delay: Duration,
    timeout: Duration,
}

impl SpotifyCatalog {
    pub fn from_settings(settings: &CatalogSettings) -> Self {
        let credentials = match (&settings.client_id, &settings.client_secret) {
            (Some(id), Some(secret)) => Some(ClientCredentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        };
        Self {
            client: Client::new(),
            auth_url: settings.auth_url.clone(),
            api_url: settings.api_url.clone(),
            credentials,
            token: Arc::new(Mutex::new(None)),
            lookup_delay: Duration::from_millis(settings.lookup_delay_ms),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Return a valid bearer token, exchanging client credentials if the
    /// cached one is absent or inside its expiry margin. The cache lock is
    /// held across the exchange so concurrent callers don't stampede the
    /// token endpoint.
    async fn bearer(&self) -> Result<String, ProviderError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(ProviderError::Unconfigured)?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        debug!("Exchanging client credentials for catalog token");
        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
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

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;

        let token = CachedToken::new(
            token_response.access_token,
            token_response.expires_in,
            Utc::now(),
        );
        let bearer = token.token.clone();
        *cached = Some(token);
        Ok(bearer)
    }

    async fn search_page(&self, query: &str, limit: usize) -> Result<SearchPage, ProviderError> {
        let token = self.bearer().await?;
        let url = format!("{}/search", self.api_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", &limit.to_string()),
            ])
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

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;
        Ok(search.tracks)
    }

    async fn search_one(&self, query: &str) -> Result<Option<Track>, ProviderError> {
        let page = self.search_page(query, 1).await?;
        Ok(page.items.into_iter().next().map(Track::from))
    }

    /// Resolve a single candidate: exact-field query first, then one broad
    /// free-text retry. First hit wins.
    async fn resolve_candidate(
        &self,
        candidate: &TrackCandidate,
    ) -> Result<Option<Track>, ProviderError> {
        let exact = exact_query(&candidate.name, &candidate.artist);
        if let Some(track) = self.search_one(&exact).await? {
            return Ok(Some(track));
        }
        let broad = format!("{} {}", candidate.name, candidate.artist);
        self.search_one(&broad).await
    }
}

#[async_trait]
impl TrackCatalog for SpotifyCatalog {
    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn resolve(&self, candidates: &[TrackCandidate]) -> Result<Vec<Track>, ProviderError> {
        if self.credentials.is_none() {
            return Err(ProviderError::Unconfigured);
        }

        let mut resolved = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            match self.resolve_candidate(candidate).await {
                Ok(Some(track)) => resolved.push(track),
                Ok(None) => {
                    debug!(
                        name = %candidate.name,
                        artist = %candidate.artist,
                        "No catalog match, keeping suggestion"
                    );
                    resolved.push(Track::from_candidate(candidate));
                }
                Err(e) => {
                    warn!(
                        name = %candidate.name,
                        artist = %candidate.artist,
                        error = %e,
                        "Catalog lookup failed, keeping suggestion"
                    );
                    resolved.push(Track::from_candidate(candidate));
                }
            }

            // Politeness delay between lookups, not a correctness requirement.
            if i + 1 < candidates.len() {
                tokio::time::sleep(self.lookup_delay).await;
            }
        }

        Ok(resolved)
    }

    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>, ProviderError> {
        let page = self.search_page(query, limit).await?;
        Ok(page.items.into_iter().map(Track::from).collect())
    }
}

/// Field-scoped query matching both name and artist exactly.
fn exact_query(name: &str, artist: &str) -> String {
    format!("track:\"{name}\" artist:\"{artist}\"")
}

/// Render a catalog duration in milliseconds as `m:ss`.
fn format_duration(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{minutes}:{seconds:02}")
}

// Spotify API types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchPage,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    duration_ms: u64,
    external_urls: ExternalUrls,
    #[serde(default)]
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: String,
}

impl From<SpotifyTrack> for Track {
    fn from(track: SpotifyTrack) -> Self {
        Track {
            name: track.name,
            artist: track
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album: track.album.name,
            duration: format_duration(track.duration_ms),
            catalog_url: Some(track.external_urls.spotify),
            catalog_id: Some(track.id),
            preview_url: track.preview_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_token_valid_before_margin() {
        let token = CachedToken::new("abc".to_string(), 3600, at(1_700_000_000));
        assert!(token.is_valid(at(1_700_000_000)));
        assert!(token.is_valid(at(1_700_000_000 + 3600 - 61)));
    }

    #[test]
    fn test_token_expires_inside_margin() {
        let token = CachedToken::new("abc".to_string(), 3600, at(1_700_000_000));
        assert!(!token.is_valid(at(1_700_000_000 + 3600 - 60)));
        assert!(!token.is_valid(at(1_700_000_000 + 3600)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(187_000), "3:07");
        assert_eq!(format_duration(336_000), "5:36");
        assert_eq!(format_duration(59_999), "0:59");
        assert_eq!(format_duration(60_000), "1:00");
    }

    #[test]
    fn test_exact_query_format() {
        assert_eq!(
            exact_query("Holocene", "Bon Iver"),
            "track:\"Holocene\" artist:\"Bon Iver\""
        );
    }

    #[test]
    fn test_spotify_track_conversion() {
        let json = r#"{
            "id": "4fbvXwMTXPWaFyaMWUm9CR",
            "name": "Holocene",
            "artists": [{"name": "Bon Iver"}, {"name": "Sean Carey"}],
            "album": {"name": "Bon Iver, Bon Iver"},
            "duration_ms": 336000,
            "external_urls": {"spotify": "https://open.spotify.com/track/4fbvX"},
            "preview_url": null
        }"#;
        let spotify: SpotifyTrack = serde_json::from_str(json).unwrap();
        let track = Track::from(spotify);
        assert_eq!(track.artist, "Bon Iver, Sean Carey");
        assert_eq!(track.duration, "5:36");
        assert_eq!(track.catalog_id.as_deref(), Some("4fbvXwMTXPWaFyaMWUm9CR"));
        assert!(track.preview_url.is_none());
    }

    #[tokio::test]
    async fn test_resolve_unconfigured() {
        let catalog = SpotifyCatalog::from_settings(&CatalogSettings::default());
        assert!(!catalog.is_configured());
        let err = catalog.resolve(&[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unconfigured));
    }
}
