// src/store/mod.rs
//! Content persistence and the de-duplication gate.
//!
//! Every ingested item carries a natural key (its identity independent of
//! the generated row id). `upsert` is an atomic insert-if-absent against a
//! UNIQUE(owner_id, natural_key) constraint, so concurrent runs for the same
//! owner cannot race a check-then-insert into duplicate rows.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::aggregate::types::Source;
use crate::oauth::StoredCredentials;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// De-duplication identity of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// Canonical source URL (YouTube watch URLs, article links).
    Url(String),
    /// Feed-scoped identity used by RSS-style ingestion.
    External {
        source_key: String,
        external_id: String,
    },
}

impl NaturalKey {
    pub fn external(source_key: impl Into<String>, external_id: impl Into<String>) -> Self {
        NaturalKey::External {
            source_key: source_key.into(),
            external_id: external_id.into(),
        }
    }

    /// Stable single-column encoding for the UNIQUE constraint.
    pub fn encode(&self) -> String {
        match self {
            NaturalKey::Url(url) => format!("url:{}", url.trim()),
            NaturalKey::External {
                source_key,
                external_id,
            } => format!("ext:{source_key}:{external_id}"),
        }
    }
}

/// Persisted content item, as consumed by the dashboard UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content_type: String,
    pub platform: String,
    pub original_url: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub full_content: Option<String>,
    /// Free-form: tags, sentiment, processedAt.
    pub metadata: serde_json::Value,
    pub folder_id: Option<String>,
    #[serde(skip)]
    pub natural_key: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert payload; row id and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewContentItem {
    pub owner_id: String,
    pub title: String,
    pub content_type: String,
    pub platform: String,
    pub original_url: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub full_content: Option<String>,
    pub metadata: serde_json::Value,
    pub natural_key: NaturalKey,
}

/// Result of an atomic insert-if-absent.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Inserted(ContentItem),
    Existing(ContentItem),
}

impl UpsertOutcome {
    pub fn item(&self) -> &ContentItem {
        match self {
            UpsertOutcome::Inserted(item) | UpsertOutcome::Existing(item) => item,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Dedup gate: does an item with this natural key exist for the owner?
    async fn exists(&self, owner_id: &str, key: &NaturalKey) -> Result<bool>;

    /// Atomic insert-if-absent; returns the existing row when the natural
    /// key is already taken.
    async fn upsert(&self, item: NewContentItem) -> Result<UpsertOutcome>;

    async fn items_for_owner(&self, owner_id: &str) -> Result<Vec<ContentItem>>;

    /// Already-persisted uploads for the owner, newest first.
    async fn recent_uploads(&self, owner_id: &str, max_items: usize) -> Result<Vec<ContentItem>>;

    async fn save_source(&self, source: &Source) -> Result<()>;

    async fn sources_for_owner(&self, owner_id: &str) -> Result<Vec<Source>>;

    /// Distinct owners with at least one configured source (scheduled sweep).
    async fn owners_with_sources(&self) -> Result<Vec<String>>;

    async fn load_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
    ) -> Result<Option<StoredCredentials>>;

    async fn save_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
        creds: &StoredCredentials,
    ) -> Result<()>;
}

pub type SharedStore = Arc<dyn ContentStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_encoding_is_stable_and_distinct() {
        let url = NaturalKey::Url("https://example.com/a".into());
        assert_eq!(url.encode(), "url:https://example.com/a");

        let ext = NaturalKey::external("rss:feed", "guid-1");
        assert_eq!(ext.encode(), "ext:rss:feed:guid-1");

        assert_ne!(
            NaturalKey::Url("x".into()).encode(),
            NaturalKey::external("x", "").encode()
        );
    }
}
