// src/platform.rs
//! Platform keys and synonym normalization.
//!
//! The synonym table is a pure function kept separate from the adapter
//! registry so new aliases can be added (and tested) without touching any
//! adapter code. Dispatch always runs `normalize` first, then `parse`.

use serde::{Deserialize, Serialize};

/// The closed set of platforms an adapter can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitter,
    Reddit,
    Podcasts,
    Email,
    Slack,
    Rss,
    Uploads,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Reddit => "reddit",
            Platform::Podcasts => "podcasts",
            Platform::Email => "email",
            Platform::Slack => "slack",
            Platform::Rss => "rss",
            Platform::Uploads => "uploads",
        }
    }

    /// Parse an already-normalized key. Unknown keys yield `None`; the
    /// aggregation loop turns that into a "no handler" outcome.
    pub fn parse(key: &str) -> Option<Platform> {
        match key {
            "youtube" => Some(Platform::Youtube),
            "twitter" => Some(Platform::Twitter),
            "reddit" => Some(Platform::Reddit),
            "podcasts" => Some(Platform::Podcasts),
            "email" => Some(Platform::Email),
            "slack" => Some(Platform::Slack),
            "rss" => Some(Platform::Rss),
            "uploads" => Some(Platform::Uploads),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse user-facing platform synonyms to the adapter key.
///
/// Unrecognized keys pass through unchanged (lowercased/trimmed) so the
/// caller can report "no handler for platform 'x'" with the original name.
pub fn normalize(raw: &str) -> String {
    let key = raw.trim().to_ascii_lowercase();
    match key.as_str() {
        "newsletters" | "substack" => "rss".to_string(),
        "podcast" => "podcasts".to_string(),
        "emails" => "email".to_string(),
        _ => key,
    }
}
