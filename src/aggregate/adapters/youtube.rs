// src/aggregate/adapters/youtube.rs
//! YouTube adapter: channel search ordered by date, watch-URL dedup against
//! the store, summarization of new videos.

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::aggregate::types::{
    FetchContext, FetchOutcome, ItemStatus, NormalizedItem, Source, SourceAdapter, VideoItem,
};
use crate::platform::Platform;
use crate::store::{NaturalKey, NewContentItem};
use crate::summarize::LengthHint;

use super::Transport;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// The search API stays cheap: newest few videos only.
const PAGE_SIZE: usize = 3;

pub struct YoutubeAdapter {
    transport: Transport,
    api_key: Option<String>,
}

impl YoutubeAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            transport: Transport::http(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Canned search response; used by tests.
    pub fn from_fixture(content: &str) -> Self {
        Self {
            transport: Transport::fixture(content),
            api_key: Some("fixture".to_string()),
        }
    }
}

/// Accepts a bare channel id or a channel/user URL
/// (`.../channel/<id>`, `.../user/<id>`).
pub(crate) fn extract_channel_id(raw: &str) -> String {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"(?:channel|user)/([A-Za-z0-9_-]+)").unwrap());
    re.captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[async_trait::async_trait]
impl SourceAdapter for YoutubeAdapter {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let Some(raw) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(FetchOutcome::failed("no channel configured"));
        };
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(FetchOutcome::failed("YouTube API key not configured"));
        };
        let channel_id = extract_channel_id(raw);

        let url = format!(
            "{SEARCH_URL}?part=snippet&channelId={channel_id}&order=date&type=video\
             &maxResults={PAGE_SIZE}&key={api_key}"
        );
        let body = match self.transport.get_text(&url, None).await {
            Ok(body) => body,
            Err(e) => return Ok(FetchOutcome::failed(format!("video search failed: {e:#}"))),
        };
        let search: SearchResponse = match serde_json::from_str(&body) {
            Ok(search) => search,
            Err(e) => {
                return Ok(FetchOutcome::empty(format!(
                    "unexpected search response: {e}"
                )))
            }
        };

        let mut items = Vec::new();
        let mut processed = 0usize;
        let mut errored = 0usize;

        for video in search.items {
            let Some(video_id) = video.id.video_id else {
                continue;
            };
            let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
            let key = NaturalKey::Url(watch_url.clone());

            if ctx.store.exists(&source.owner_id, &key).await? {
                items.push(NormalizedItem::Video(VideoItem {
                    title: video.snippet.title,
                    url: watch_url,
                    video_id,
                    status: ItemStatus::Skipped,
                    reason: Some("Already processed".to_string()),
                    content_id: None,
                }));
                continue;
            }

            let content = format!("{}\n\n{}", video.snippet.title, video.snippet.description);
            match ctx.summarizer.summarize(&content, LengthHint::Standard).await {
                Ok(summary) => {
                    let upsert = ctx
                        .store
                        .upsert(NewContentItem {
                            owner_id: source.owner_id.clone(),
                            title: video.snippet.title.clone(),
                            content_type: "video".to_string(),
                            platform: Platform::Youtube.as_str().to_string(),
                            original_url: Some(watch_url.clone()),
                            author: Some(source.source_name.clone()),
                            summary: Some(summary.summary),
                            full_content: Some(video.snippet.description.clone()),
                            metadata: json!({
                                "tags": summary.tags,
                                "sentiment": summary.sentiment.as_str(),
                                "processedAt": Utc::now().to_rfc3339(),
                                "publishedAt": video.snippet.published_at,
                            }),
                            natural_key: key,
                        })
                        .await?;
                    if upsert.was_inserted() {
                        processed += 1;
                    }
                    items.push(NormalizedItem::Video(VideoItem {
                        title: video.snippet.title,
                        url: watch_url,
                        video_id,
                        status: ItemStatus::Processed,
                        reason: None,
                        content_id: Some(upsert.item().id.clone()),
                    }));
                }
                Err(e) => {
                    errored += 1;
                    items.push(NormalizedItem::Video(VideoItem {
                        title: video.snippet.title,
                        url: watch_url,
                        video_id,
                        status: ItemStatus::Error,
                        reason: Some(format!("{e:#}")),
                        content_id: None,
                    }));
                }
            }
        }

        let mut outcome = FetchOutcome::ok(processed, items);
        if processed == 0 && errored == 0 {
            outcome = outcome.with_warning("No new videos found");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_extraction_handles_urls_and_bare_ids() {
        assert_eq!(
            extract_channel_id("https://www.youtube.com/channel/UCabc_123-x"),
            "UCabc_123-x"
        );
        assert_eq!(
            extract_channel_id("https://youtube.com/user/janequant"),
            "janequant"
        );
        assert_eq!(extract_channel_id("UCplainid"), "UCplainid");
    }
}
