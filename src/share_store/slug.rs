//! Share slug generation.
//!
//! Slugs double as storage keys and public share-link path segments, so they
//! stay short and human-readable: `{adjective}-{noun}-{1-999}`. Collisions
//! are not checked; the space is large relative to expected volume.

use rand::Rng;

const ADJECTIVES: [&str; 10] = [
    "dreamy", "cosmic", "ethereal", "vibrant", "serene", "mystic", "golden", "velvet", "crystal",
    "lunar",
];

const NOUNS: [&str; 10] = [
    "melody", "whisper", "echo", "rhythm", "harmony", "breeze", "glow", "spark", "wave", "muse",
];

pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let number: u16 = rng.random_range(1..=999);
    format!("{adjective}-{noun}-{number}")
}
