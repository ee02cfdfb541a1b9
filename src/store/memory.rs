// src/store/memory.rs
//! In-memory `ContentStore` used by tests and local runs without a database.
//! Mirrors the SQLite store's semantics, including insert-if-absent.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;

use super::{ContentItem, ContentStore, NaturalKey, NewContentItem, UpsertOutcome};
use crate::aggregate::types::Source;
use crate::oauth::StoredCredentials;

#[derive(Default)]
struct Inner {
    sources: Vec<Source>,
    items: Vec<ContentItem>,
    /// (owner_id, encoded natural key) -> row id
    keys: HashMap<(String, String), String>,
    creds: HashMap<(String, String), StoredCredentials>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn exists(&self, owner_id: &str, key: &NaturalKey) -> Result<bool> {
        let g = self.inner.lock().expect("memory store poisoned");
        Ok(g.keys
            .contains_key(&(owner_id.to_string(), key.encode())))
    }

    async fn upsert(&self, item: NewContentItem) -> Result<UpsertOutcome> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        let slot = (item.owner_id.clone(), item.natural_key.encode());
        if let Some(existing_id) = g.keys.get(&slot) {
            let existing = g
                .items
                .iter()
                .find(|it| &it.id == existing_id)
                .cloned()
                .expect("key index points at a stored item");
            return Ok(UpsertOutcome::Existing(existing));
        }

        let now = Utc::now().to_rfc3339();
        let stored = ContentItem {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: item.owner_id,
            title: item.title,
            content_type: item.content_type,
            platform: item.platform,
            original_url: item.original_url,
            author: item.author,
            summary: item.summary,
            full_content: item.full_content,
            metadata: item.metadata,
            folder_id: None,
            natural_key: slot.1.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        g.keys.insert(slot, stored.id.clone());
        g.items.push(stored.clone());
        Ok(UpsertOutcome::Inserted(stored))
    }

    async fn items_for_owner(&self, owner_id: &str) -> Result<Vec<ContentItem>> {
        let g = self.inner.lock().expect("memory store poisoned");
        Ok(g.items
            .iter()
            .filter(|it| it.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn recent_uploads(&self, owner_id: &str, max_items: usize) -> Result<Vec<ContentItem>> {
        let g = self.inner.lock().expect("memory store poisoned");
        let mut uploads: Vec<ContentItem> = g
            .items
            .iter()
            .filter(|it| it.owner_id == owner_id && it.platform == "uploads")
            .cloned()
            .collect();
        uploads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        uploads.truncate(max_items);
        Ok(uploads)
    }

    async fn save_source(&self, source: &Source) -> Result<()> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        if let Some(slot) = g.sources.iter_mut().find(|s| s.id == source.id) {
            *slot = source.clone();
        } else {
            g.sources.push(source.clone());
        }
        Ok(())
    }

    async fn sources_for_owner(&self, owner_id: &str) -> Result<Vec<Source>> {
        let g = self.inner.lock().expect("memory store poisoned");
        Ok(g.sources
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn owners_with_sources(&self) -> Result<Vec<String>> {
        let g = self.inner.lock().expect("memory store poisoned");
        let mut owners: Vec<String> = g.sources.iter().map(|s| s.owner_id.clone()).collect();
        owners.sort();
        owners.dedup();
        Ok(owners)
    }

    async fn load_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
    ) -> Result<Option<StoredCredentials>> {
        let g = self.inner.lock().expect("memory store poisoned");
        Ok(g.creds
            .get(&(owner_id.to_string(), source_kind.to_string()))
            .cloned())
    }

    async fn save_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
        creds: &StoredCredentials,
    ) -> Result<()> {
        let mut g = self.inner.lock().expect("memory store poisoned");
        g.creds.insert(
            (owner_id.to_string(), source_kind.to_string()),
            creds.clone(),
        );
        Ok(())
    }
}
