// src/aggregate/adapters/rss.rs
//! RSS adapter, also serving the `substack`/`newsletters` synonyms.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use crate::aggregate::types::{
    ArticleItem, FetchContext, FetchOutcome, ItemStatus, NormalizedItem, Source, SourceAdapter,
};
use crate::feed;
use crate::platform::Platform;
use crate::store::{NaturalKey, NewContentItem};

use super::Transport;

pub struct RssAdapter {
    transport: Transport,
}

impl RssAdapter {
    pub fn new() -> Self {
        Self {
            transport: Transport::http(),
        }
    }

    /// Parse a canned feed body instead of fetching; used by tests.
    pub fn from_fixture(content: &str) -> Self {
        Self {
            transport: Transport::fixture(content),
        }
    }
}

impl Default for RssAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for RssAdapter {
    fn platform(&self) -> Platform {
        Platform::Rss
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let Some(feed_url) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(FetchOutcome::failed("no feed URL configured"));
        };

        let body = match self.transport.get_text(feed_url, None).await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::failed(format!("feed fetch failed: {e:#}"))),
        };

        let entries = match feed::parse_rss(&body) {
            Ok(entries) => entries,
            // Malformed XML degrades to an empty result with a warning.
            Err(e) => return Ok(FetchOutcome::empty(format!("feed parse error: {e:#}"))),
        };

        if entries.is_empty() {
            return Ok(FetchOutcome::empty("No new articles found"));
        }

        let source_key = format!("rss:{feed_url}");
        let mut items = Vec::new();
        let mut processed = 0usize;

        for entry in entries.into_iter().take(ctx.max_items) {
            let external_id = feed::external_id(&entry);
            let title = entry
                .title
                .as_deref()
                .map(feed::normalize_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "(untitled)".to_string());
            let excerpt = entry.description.as_deref().map(feed::normalize_text);
            let published_at = entry
                .published
                .as_deref()
                .and_then(feed::rfc2822_to_rfc3339)
                .or(entry.published.clone());

            let upsert = ctx
                .store
                .upsert(NewContentItem {
                    owner_id: source.owner_id.clone(),
                    title: title.clone(),
                    content_type: "article".to_string(),
                    platform: Platform::Rss.as_str().to_string(),
                    original_url: entry.link.clone(),
                    author: entry.author.clone(),
                    summary: excerpt.clone(),
                    full_content: entry.description.clone(),
                    metadata: json!({ "processedAt": Utc::now().to_rfc3339() }),
                    natural_key: NaturalKey::external(source_key.clone(), external_id.clone()),
                })
                .await?;

            let status = if upsert.was_inserted() {
                processed += 1;
                ItemStatus::Processed
            } else {
                ItemStatus::Skipped
            };
            items.push(NormalizedItem::Article(ArticleItem {
                title,
                url: entry.link,
                external_id,
                author: entry.author,
                published_at,
                excerpt,
                status,
            }));
        }

        let mut outcome = FetchOutcome::ok(processed, items);
        if processed == 0 {
            outcome = outcome.with_warning("No new articles found");
        }
        Ok(outcome)
    }
}
