// src/aggregate/types.rs
//! Shared shapes of the aggregation core: configured sources, the
//! per-platform item union, adapter outcomes, and the adapter trait.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::store::SharedStore;
use crate::summarize::SharedSummarizer;

/// An "influencer source": one person/feed a user tracks across platforms.
/// `selected_platforms` keeps the raw keys as configured in the settings UI;
/// normalization happens at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub owner_id: String,
    pub source_name: String,
    #[serde(default)]
    pub selected_platforms: Vec<String>,
    #[serde(default)]
    pub platform_identifiers: HashMap<String, String>,
}

impl Source {
    /// Identifier for a normalized platform key, tolerating configs that
    /// stored it under a raw synonym ("newsletters" instead of "rss").
    pub fn identifier_for(&self, normalized: &str, raw: &str) -> Option<&str> {
        self.platform_identifiers
            .get(normalized)
            .or_else(|| self.platform_identifiers.get(raw))
            .map(String::as_str)
    }
}

/// Ingestion status of a single item within one adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Processed,
    Skipped,
    Error,
}

/// Adapter output items as a tagged union keyed by platform family, so each
/// variant carries only the fields meaningful to its platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NormalizedItem {
    Video(VideoItem),
    Article(ArticleItem),
    Post(PostItem),
    Message(MessageItem),
    Email(EmailItem),
    Episode(EpisodeItem),
    Upload(UploadItem),
}

impl NormalizedItem {
    pub fn status(&self) -> Option<ItemStatus> {
        match self {
            NormalizedItem::Video(v) => Some(v.status),
            NormalizedItem::Article(a) => Some(a.status),
            NormalizedItem::Post(p) => Some(p.status),
            NormalizedItem::Message(m) => Some(m.status),
            NormalizedItem::Email(e) => Some(e.status),
            NormalizedItem::Episode(e) => Some(e.status),
            NormalizedItem::Upload(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub title: String,
    pub url: String,
    pub video_id: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailItem {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    pub title: String,
    pub content_id: String,
    pub created_at: String,
}

/// What one adapter call produced. `processed_items` counts only items that
/// were newly persisted this run, so re-runs against unchanged upstreams
/// report zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub success: bool,
    pub processed_items: usize,
    pub items: Vec<NormalizedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FetchOutcome {
    pub fn ok(processed_items: usize, items: Vec<NormalizedItem>) -> Self {
        Self {
            success: true,
            processed_items,
            items,
            error: None,
            warnings: Vec::new(),
            details: None,
        }
    }

    /// Successful reach, nothing new upstream. Absence of items is a
    /// warning, never an error.
    pub fn empty(warning: impl Into<String>) -> Self {
        Self {
            success: true,
            processed_items: 0,
            items: Vec::new(),
            error: None,
            warnings: vec![warning.into()],
            details: None,
        }
    }

    /// Recoverable adapter failure (config/transport/parse/auth).
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            processed_items: 0,
            items: Vec::new(),
            error: Some(error.into()),
            warnings: Vec::new(),
            details: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Shared dependencies handed to every adapter call.
#[derive(Clone)]
pub struct FetchContext {
    pub store: SharedStore,
    pub summarizer: SharedSummarizer,
    /// Per-adapter item cap (feeds default to this; YouTube stays at its
    /// own small page size).
    pub max_items: usize,
}

impl FetchContext {
    pub fn new(store: SharedStore, summarizer: SharedSummarizer) -> Self {
        Self {
            store,
            summarizer,
            max_items: 5,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }
}

/// One platform's native fetch/parse logic behind the common contract.
///
/// Adapters convert their own transport/parse failures into
/// `FetchOutcome::failed`; a returned `Err` is still tolerated by the loop
/// and recorded as a failed outcome, so no adapter can abort a run.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome>;
}

pub type SharedAdapter = Arc<dyn SourceAdapter>;
