// src/aggregate/adapters/twitter.rs
//! Twitter adapter: reads an RSS mirror of the profile timeline. Item ids
//! fall back through guid -> title -> link.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use crate::aggregate::types::{
    FetchContext, FetchOutcome, ItemStatus, NormalizedItem, PostItem, Source, SourceAdapter,
};
use crate::feed::{self, RawEntry};
use crate::platform::Platform;
use crate::store::{NaturalKey, NewContentItem};

use super::Transport;

const MIRROR_BASE: &str = "https://nitter.net";

pub struct TwitterAdapter {
    transport: Transport,
}

impl TwitterAdapter {
    pub fn new() -> Self {
        Self {
            transport: Transport::http(),
        }
    }

    pub fn from_fixture(content: &str) -> Self {
        Self {
            transport: Transport::fixture(content),
        }
    }
}

impl Default for TwitterAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// guid -> title -> link, per the mirror's sparse metadata.
fn entry_id(entry: &RawEntry) -> Option<String> {
    entry
        .guid
        .clone()
        .or_else(|| entry.title.clone())
        .or_else(|| entry.link.clone())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait::async_trait]
impl SourceAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let Some(raw_handle) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(FetchOutcome::failed("no handle configured"));
        };
        let handle = raw_handle.trim_start_matches('@');
        let url = format!("{MIRROR_BASE}/{handle}/rss");

        let body = match self.transport.get_text(&url, None).await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::failed(format!("timeline fetch failed: {e:#}"))),
        };

        let entries = match feed::parse_rss(&body) {
            Ok(entries) => entries,
            Err(e) => return Ok(FetchOutcome::empty(format!("timeline parse error: {e:#}"))),
        };

        if entries.is_empty() {
            return Ok(FetchOutcome::empty("No new tweets found"));
        }

        let source_key = format!("twitter:{handle}");
        let mut items = Vec::new();
        let mut processed = 0usize;

        for entry in entries.into_iter().take(ctx.max_items) {
            let Some(external_id) = entry_id(&entry) else {
                continue;
            };
            let body_text = entry
                .description
                .as_deref()
                .map(feed::normalize_text)
                .filter(|t| !t.is_empty());
            let title = entry
                .title
                .as_deref()
                .map(feed::normalize_text)
                .filter(|t| !t.is_empty())
                .or_else(|| body_text.clone())
                .unwrap_or_else(|| "(untitled)".to_string());
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
                    content_type: "post".to_string(),
                    platform: Platform::Twitter.as_str().to_string(),
                    original_url: entry.link.clone(),
                    author: Some(format!("@{handle}")),
                    summary: body_text.clone(),
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
            items.push(NormalizedItem::Post(PostItem {
                title,
                url: entry.link,
                external_id,
                author: Some(format!("@{handle}")),
                published_at,
                body: body_text,
                status,
            }));
        }

        if items.is_empty() {
            return Ok(FetchOutcome::empty("No new tweets found"));
        }
        let mut outcome = FetchOutcome::ok(processed, items);
        if processed == 0 {
            outcome = outcome.with_warning("No new tweets found");
        }
        Ok(outcome)
    }
}
