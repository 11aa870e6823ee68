//! Provider clients.
//!
//! Each third-party networked service gets one thin client behind a trait,
//! so the orchestrator can be exercised with fakes. Credentials are optional
//! at configuration time; a client without credentials reports
//! `is_configured() == false` and fails calls with
//! [`ProviderError::Unconfigured`] rather than preventing startup.

pub mod catalog;
pub mod completion;
pub mod images;

pub use catalog::{SpotifyCatalog, TrackCatalog};
pub use completion::{MoodAnalyzer, OpenAiAnalyzer};
pub use images::{ImageGenerator, OpenAiImageGenerator};

use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing credential. Expected, not exceptional.
    #[error("provider credentials not configured")]
    Unconfigured,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    /// Remote call returned a non-success status.
    #[error("API error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// Remote call succeeded but the payload violates the expected schema.
    #[error("malformed response: {0}")]
    Malformed(#[from] MalformedResponse),

    /// Every attempt in an image generation batch failed.
    #[error("all image generation attempts failed")]
    NoImagesGenerated,
}

/// How a completion payload violated the expected schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedResponse {
    #[error("response contained no message content")]
    MissingContent,

    /// The content has no `{` or no `}` to extract a JSON object from.
    #[error("no JSON object found in message content")]
    NoJsonObject,

    #[error("message content is not valid JSON: {0}")]
    InvalidJson(String),

    /// One or more of the four required fields is missing or has the wrong
    /// type. All offending fields are listed.
    #[error("missing or invalid fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("suggested tracks are not a list of name/artist entries: {0}")]
    InvalidTracks(String),

    #[error("suggested tracks list is empty")]
    EmptyTracks,
}

/// Map a reqwest transport failure onto the provider taxonomy. Timeouts are
/// kept distinct so callers can tell a slow provider from an unreachable one.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Connection(e.to_string())
    }
}
