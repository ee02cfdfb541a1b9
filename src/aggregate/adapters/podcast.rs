// src/aggregate/adapters/podcast.rs
//! Podcast adapter: episode RSS with `<itunes:duration>` and `<enclosure>`.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use crate::aggregate::types::{
    EpisodeItem, FetchContext, FetchOutcome, ItemStatus, NormalizedItem, Source, SourceAdapter,
};
use crate::feed;
use crate::platform::Platform;
use crate::store::{NaturalKey, NewContentItem};

use super::Transport;

pub struct PodcastAdapter {
    transport: Transport,
}

impl PodcastAdapter {
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

impl Default for PodcastAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for PodcastAdapter {
    fn platform(&self) -> Platform {
        Platform::Podcasts
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let Some(feed_url) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(FetchOutcome::failed("no podcast feed configured"));
        };

        let body = match self.transport.get_text(feed_url, None).await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::failed(format!("feed fetch failed: {e:#}"))),
        };

        let entries = match feed::parse_rss(&body) {
            Ok(entries) => entries,
            Err(e) => return Ok(FetchOutcome::empty(format!("feed parse error: {e:#}"))),
        };

        if entries.is_empty() {
            return Ok(FetchOutcome::empty("No new episodes found"));
        }

        let source_key = format!("podcasts:{feed_url}");
        let mut items = Vec::new();
        let mut processed = 0usize;

        for entry in entries.into_iter().take(ctx.max_items) {
            let external_id = feed::external_id(&entry);
            let title = entry
                .title
                .as_deref()
                .map(feed::normalize_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "(untitled episode)".to_string());
            let duration_seconds = entry.duration.as_deref().and_then(feed::parse_duration_secs);
            let published_at = entry
                .published
                .as_deref()
                .and_then(feed::rfc2822_to_rfc3339)
                .or(entry.published.clone());

            let natural_key = match entry.link.as_deref() {
                Some(link) if !link.trim().is_empty() => NaturalKey::Url(link.to_string()),
                _ => NaturalKey::external(source_key.clone(), external_id.clone()),
            };
            let upsert = ctx
                .store
                .upsert(NewContentItem {
                    owner_id: source.owner_id.clone(),
                    title: title.clone(),
                    content_type: "episode".to_string(),
                    platform: Platform::Podcasts.as_str().to_string(),
                    original_url: entry.link.clone(),
                    author: entry.author.clone(),
                    summary: entry.description.as_deref().map(feed::normalize_text),
                    full_content: entry.description.clone(),
                    metadata: json!({
                        "processedAt": Utc::now().to_rfc3339(),
                        "audioUrl": entry.enclosure_url.clone(),
                        "durationSeconds": duration_seconds,
                    }),
                    natural_key,
                })
                .await?;

            let status = if upsert.was_inserted() {
                processed += 1;
                ItemStatus::Processed
            } else {
                ItemStatus::Skipped
            };
            items.push(NormalizedItem::Episode(EpisodeItem {
                title,
                url: entry.link,
                audio_url: entry.enclosure_url,
                duration_seconds,
                published_at,
                status,
            }));
        }

        let mut outcome = FetchOutcome::ok(processed, items);
        if processed == 0 {
            outcome = outcome.with_warning("No new episodes found");
        }
        Ok(outcome)
    }
}
