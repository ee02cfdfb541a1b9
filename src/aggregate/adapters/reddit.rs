// src/aggregate/adapters/reddit.rs
//! Reddit adapter: public Atom feed of a subreddit.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use crate::aggregate::types::{
    FetchContext, FetchOutcome, ItemStatus, NormalizedItem, PostItem, Source, SourceAdapter,
};
use crate::feed;
use crate::platform::Platform;
use crate::store::{NaturalKey, NewContentItem};

use super::Transport;

pub struct RedditAdapter {
    transport: Transport,
}

impl RedditAdapter {
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

impl Default for RedditAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts "investing", "r/investing", or "/r/investing/".
pub(crate) fn canonical_subreddit(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('/')
        .trim_start_matches("r/")
        .trim_end_matches('/')
        .to_string()
}

#[async_trait::async_trait]
impl SourceAdapter for RedditAdapter {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let Some(raw) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(FetchOutcome::failed("no subreddit configured"));
        };
        let subreddit = canonical_subreddit(raw);
        if subreddit.is_empty() {
            return Ok(FetchOutcome::failed(format!(
                "malformed subreddit identifier '{raw}'"
            )));
        }
        let url = format!("https://www.reddit.com/r/{subreddit}.rss");

        let body = match self.transport.get_text(&url, None).await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::failed(format!("subreddit fetch failed: {e:#}"))),
        };

        let entries = match feed::parse_atom(&body) {
            Ok(entries) => entries,
            Err(e) => return Ok(FetchOutcome::empty(format!("subreddit parse error: {e:#}"))),
        };

        if entries.is_empty() {
            return Ok(FetchOutcome::empty("No new posts found"));
        }

        let source_key = format!("reddit:{subreddit}");
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
            let body_text = entry.description.as_deref().map(feed::normalize_text);

            let natural_key = match entry.link.as_deref() {
                Some(link) if !link.trim().is_empty() => NaturalKey::Url(link.to_string()),
                _ => NaturalKey::external(source_key.clone(), external_id.clone()),
            };
            let upsert = ctx
                .store
                .upsert(NewContentItem {
                    owner_id: source.owner_id.clone(),
                    title: title.clone(),
                    content_type: "post".to_string(),
                    platform: Platform::Reddit.as_str().to_string(),
                    original_url: entry.link.clone(),
                    author: entry.author.clone(),
                    summary: body_text.clone(),
                    full_content: entry.description.clone(),
                    metadata: json!({ "processedAt": Utc::now().to_rfc3339() }),
                    natural_key,
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
                author: entry.author,
                published_at: entry.published,
                body: body_text,
                status,
            }));
        }

        let mut outcome = FetchOutcome::ok(processed, items);
        if processed == 0 {
            outcome = outcome.with_warning("No new posts found");
        }
        Ok(outcome)
    }
}
