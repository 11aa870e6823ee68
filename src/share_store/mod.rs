//! Moodboard share store.
//!
//! Persists composite results under short human-readable slugs so they can
//! be shared via `{base_url}/board/{id}`. The store contract is two methods;
//! retrieval increments the record's view count as an observable side effect.

mod slug;
mod sqlite_store;

pub(crate) mod schema;

pub use slug::generate_slug;
pub use sqlite_store::SqliteMoodboardStore;

use crate::moodboard::{MoodboardResult, SharedMoodboard};
use anyhow::Result;

/// Trait for moodboard persistence backends.
pub trait MoodboardStore: Send + Sync {
    /// Persist `result` under a freshly generated slug with a zero view
    /// count. Returns the slug.
    fn save(&self, result: &MoodboardResult) -> Result<String>;

    /// Fetch a shared moodboard by slug, incrementing its view count by
    /// exactly one. An unknown slug is `None`, not an error.
    fn get(&self, id: &str) -> Result<Option<SharedMoodboard>>;
}

/// Public share link for a stored moodboard.
pub fn share_url(base_url: &str, id: &str) -> String {
    format!("{}/board/{}", base_url.trim_end_matches('/'), id)
}
