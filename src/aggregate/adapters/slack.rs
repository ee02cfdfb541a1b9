// src/aggregate/adapters/slack.rs
//! Slack adapter: bot-token-gated conversation history with cursor
//! pagination. Slack's fractional-seconds `ts` becomes an RFC3339 instant.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::aggregate::types::{
    FetchContext, FetchOutcome, ItemStatus, MessageItem, NormalizedItem, Source, SourceAdapter,
};
use crate::platform::Platform;
use crate::store::{NaturalKey, NewContentItem};

use super::Transport;

const HISTORY_URL: &str = "https://slack.com/api/conversations.history";

pub struct SlackAdapter {
    transport: Transport,
    bot_token: Option<String>,
}

impl SlackAdapter {
    pub fn new(bot_token: Option<String>) -> Self {
        Self {
            transport: Transport::http(),
            bot_token: bot_token.filter(|t| !t.is_empty()),
        }
    }

    /// Canned history response; used by tests. Pagination is not exercised
    /// in fixture mode (the same body would repeat forever).
    pub fn from_fixture(content: &str) -> Self {
        Self {
            transport: Transport::fixture(content),
            bot_token: Some("fixture".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    #[serde(default)]
    text: String,
    user: Option<String>,
    ts: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// "1712345678.000200" -> "2024-04-05T..Z". Sub-second precision is kept.
pub(crate) fn ts_to_rfc3339(ts: &str) -> Option<String> {
    let mut parts = ts.splitn(2, '.');
    let secs: i64 = parts.next()?.parse().ok()?;
    let frac = parts.next().unwrap_or("0");
    let micros: u32 = format!("{frac:0<6}").chars().take(6).collect::<String>().parse().ok()?;
    DateTime::<Utc>::from_timestamp(secs, micros * 1_000).map(|dt| dt.to_rfc3339())
}

#[async_trait::async_trait]
impl SourceAdapter for SlackAdapter {
    fn platform(&self) -> Platform {
        Platform::Slack
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let Some(channel) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(FetchOutcome::failed("no channel configured"));
        };
        let Some(token) = self.bot_token.as_deref() else {
            return Ok(FetchOutcome::failed("Slack bot token not configured"));
        };

        let mut messages: Vec<SlackMessage> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut url = format!("{HISTORY_URL}?channel={channel}&limit={}", ctx.max_items);
            if let Some(c) = &cursor {
                url.push_str(&format!("&cursor={c}"));
            }
            let body = match self.transport.get_text(&url, Some(token)).await {
                Ok(body) => body,
                Err(e) => return Ok(FetchOutcome::failed(format!("history fetch failed: {e:#}"))),
            };
            let page: HistoryResponse = match serde_json::from_str(&body) {
                Ok(page) => page,
                Err(e) => {
                    return Ok(FetchOutcome::empty(format!(
                        "unexpected history response: {e}"
                    )))
                }
            };
            if !page.ok {
                return Ok(FetchOutcome::failed(format!(
                    "Slack API error: {}",
                    page.error.unwrap_or_else(|| "unknown".to_string())
                )));
            }

            messages.extend(page.messages);
            if messages.len() >= ctx.max_items {
                messages.truncate(ctx.max_items);
                break;
            }
            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() || matches!(self.transport, Transport::Fixture(_)) {
                break;
            }
        }

        if messages.is_empty() {
            return Ok(FetchOutcome::empty("No new messages found"));
        }

        let mut items = Vec::new();
        let mut processed = 0usize;
        for msg in messages {
            if matches!(msg.kind.as_deref(), Some(k) if k != "message") {
                continue;
            }
            let published_at = ts_to_rfc3339(&msg.ts);
            let title: String = msg.text.chars().take(80).collect();
            let upsert = ctx
                .store
                .upsert(NewContentItem {
                    owner_id: source.owner_id.clone(),
                    title: if title.is_empty() {
                        "(empty message)".to_string()
                    } else {
                        title
                    },
                    content_type: "message".to_string(),
                    platform: Platform::Slack.as_str().to_string(),
                    original_url: None,
                    author: msg.user.clone(),
                    summary: Some(msg.text.clone()),
                    full_content: Some(msg.text.clone()),
                    metadata: json!({
                        "ts": msg.ts.clone(),
                        "channel": channel,
                        "processedAt": Utc::now().to_rfc3339(),
                    }),
                    natural_key: NaturalKey::external(format!("slack:{channel}"), msg.ts.clone()),
                })
                .await?;

            let status = if upsert.was_inserted() {
                processed += 1;
                ItemStatus::Processed
            } else {
                ItemStatus::Skipped
            };
            items.push(NormalizedItem::Message(MessageItem {
                text: msg.text,
                user: msg.user,
                ts: msg.ts,
                published_at,
                message_type: msg.kind,
                status,
            }));
        }

        let mut outcome = FetchOutcome::ok(processed, items);
        if processed == 0 {
            outcome = outcome.with_warning("No new messages found");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_ts_converts_to_rfc3339() {
        let out = ts_to_rfc3339("1712345678.000200").unwrap();
        assert!(out.starts_with("2024-04-05T"), "got {out}");
        assert!(out.contains(".000200") || out.contains("0002"), "got {out}");
    }

    #[test]
    fn whole_second_ts_converts() {
        assert!(ts_to_rfc3339("1712345678").is_some());
        assert!(ts_to_rfc3339("not-a-ts").is_none());
    }
}
