// src/aggregate/adapters/email.rs
//! Gmail adapter: OAuth-backed inbox fetch with a keyword relevance gate.
//!
//! Credentials live in the store per (owner, "gmail"); an expired access
//! token is refreshed transparently before use and the refreshed credentials
//! are written back. Only messages matching the finance/research keyword
//! set are admitted as content items.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::aggregate::types::{
    EmailItem, FetchContext, FetchOutcome, ItemStatus, NormalizedItem, Source, SourceAdapter,
};
use crate::oauth::{OAuthClient, OAuthConfig, StoredCredentials};
use crate::platform::Platform;
use crate::relevance::KeywordFilter;
use crate::store::{NaturalKey, NewContentItem};

use super::Transport;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

pub const CREDENTIAL_KIND: &str = "gmail";

pub struct EmailAdapter {
    transport: Transport,
    oauth: Option<OAuthConfig>,
    filter: KeywordFilter,
}

impl EmailAdapter {
    pub fn new(oauth: Option<OAuthConfig>, filter: KeywordFilter) -> Self {
        Self {
            transport: Transport::http(),
            oauth,
            filter,
        }
    }

    /// Canned message list (JSON array of simplified messages); used by
    /// tests. Credential handling is bypassed in fixture mode.
    pub fn from_fixture(content: &str, filter: KeywordFilter) -> Self {
        Self {
            transport: Transport::fixture(content),
            oauth: None,
            filter,
        }
    }

    /// One-time connect: exchange the authorization code and persist the
    /// credentials for this owner.
    pub async fn connect(
        &self,
        ctx: &FetchContext,
        owner_id: &str,
        code: &str,
    ) -> Result<StoredCredentials> {
        let cfg = self
            .oauth
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Gmail OAuth client not configured"))?;
        let creds = OAuthClient::new(cfg).exchange_code(code).await?;
        ctx.store
            .save_credentials(owner_id, CREDENTIAL_KIND, &creds)
            .await?;
        Ok(creds)
    }

    /// Load credentials and refresh them when expired, writing the fresh
    /// token back. Errors here are authorization failures for the caller.
    async fn fresh_token(&self, ctx: &FetchContext, owner_id: &str) -> Result<Option<String>> {
        let Some(creds) = ctx.store.load_credentials(owner_id, CREDENTIAL_KIND).await? else {
            return Ok(None);
        };
        if !creds.is_expired_now() {
            return Ok(Some(creds.access_token));
        }
        let Some(refresh_token) = creds.refresh_token.as_deref() else {
            anyhow::bail!("Gmail access token expired and no refresh token is stored");
        };
        let Some(cfg) = self.oauth.clone() else {
            anyhow::bail!("Gmail access token expired and OAuth client is not configured");
        };
        let refreshed = OAuthClient::new(cfg).refresh(refresh_token).await?;
        ctx.store
            .save_credentials(owner_id, CREDENTIAL_KIND, &refreshed)
            .await?;
        Ok(Some(refreshed.access_token))
    }
}

/// Simplified message shape the mapping logic consumes; the HTTP path
/// assembles it from the list + metadata endpoints, fixtures provide it
/// directly.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InboxMessage {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    pub from: Option<String>,
    pub snippet: Option<String>,
    /// Epoch milliseconds, as Gmail's `internalDate`.
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<ListedMessage>,
}

#[derive(Debug, Deserialize)]
struct ListedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    snippet: Option<String>,
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

fn header_value(payload: &Option<MessagePayload>, name: &str) -> Option<String> {
    payload.as_ref().and_then(|p| {
        p.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    })
}

fn millis_to_rfc3339(raw: &str) -> Option<String> {
    let millis: i64 = raw.trim().parse().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

#[async_trait::async_trait]
impl SourceAdapter for EmailAdapter {
    fn platform(&self) -> Platform {
        Platform::Email
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        _identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let messages: Vec<InboxMessage> = match &self.transport {
            Transport::Fixture(body) => match serde_json::from_str(body) {
                Ok(msgs) => msgs,
                Err(e) => {
                    return Ok(FetchOutcome::empty(format!("unexpected inbox payload: {e}")))
                }
            },
            Transport::Http(_) => {
                if self.oauth.is_none() {
                    return Ok(FetchOutcome::failed("Gmail OAuth client not configured"));
                }
                let token = match self.fresh_token(ctx, &source.owner_id).await {
                    Ok(Some(token)) => token,
                    Ok(None) => return Ok(FetchOutcome::failed("Gmail not connected")),
                    Err(e) => {
                        return Ok(FetchOutcome::failed(format!(
                            "Gmail authorization failed: {e:#}"
                        )))
                    }
                };

                let list_url = format!(
                    "{GMAIL_BASE}/messages?maxResults={}&labelIds=INBOX",
                    ctx.max_items
                );
                let body = match self.transport.get_text(&list_url, Some(&token)).await {
                    Ok(body) => body,
                    Err(e) => {
                        return Ok(FetchOutcome::failed(format!("inbox list failed: {e:#}")))
                    }
                };
                let listed: ListResponse = match serde_json::from_str(&body) {
                    Ok(listed) => listed,
                    Err(e) => {
                        return Ok(FetchOutcome::empty(format!("unexpected inbox payload: {e}")))
                    }
                };

                let mut msgs = Vec::with_capacity(listed.messages.len());
                for entry in listed.messages {
                    let msg_url = format!(
                        "{GMAIL_BASE}/messages/{}?format=metadata\
                         &metadataHeaders=Subject&metadataHeaders=From",
                        entry.id
                    );
                    let body = match self.transport.get_text(&msg_url, Some(&token)).await {
                        Ok(body) => body,
                        Err(e) => {
                            tracing::warn!(error = ?e, id = %entry.id, "message fetch failed");
                            continue;
                        }
                    };
                    let msg: MessageResponse = match serde_json::from_str(&body) {
                        Ok(msg) => msg,
                        Err(e) => {
                            tracing::warn!(error = ?e, id = %entry.id, "message parse failed");
                            continue;
                        }
                    };
                    msgs.push(InboxMessage {
                        id: msg.id,
                        subject: header_value(&msg.payload, "Subject").unwrap_or_default(),
                        from: header_value(&msg.payload, "From"),
                        snippet: msg.snippet,
                        internal_date: msg.internal_date,
                    });
                }
                msgs
            }
        };

        if messages.is_empty() {
            return Ok(FetchOutcome::empty("No new emails found"));
        }

        let mut items = Vec::new();
        let mut processed = 0usize;
        let mut filtered_out = 0usize;

        for msg in messages.into_iter().take(ctx.max_items) {
            let haystack = format!("{} {}", msg.subject, msg.snippet.as_deref().unwrap_or(""));
            let matched = self.filter.matches(&haystack);
            if matched.is_empty() {
                filtered_out += 1;
                continue;
            }

            let received_at = msg.internal_date.as_deref().and_then(millis_to_rfc3339);
            let upsert = ctx
                .store
                .upsert(NewContentItem {
                    owner_id: source.owner_id.clone(),
                    title: if msg.subject.is_empty() {
                        "(no subject)".to_string()
                    } else {
                        msg.subject.clone()
                    },
                    content_type: "email".to_string(),
                    platform: Platform::Email.as_str().to_string(),
                    original_url: None,
                    author: msg.from.clone(),
                    summary: msg.snippet.clone(),
                    full_content: msg.snippet.clone(),
                    metadata: json!({
                        "matchedKeywords": matched.clone(),
                        "receivedAt": received_at.clone(),
                        "processedAt": Utc::now().to_rfc3339(),
                    }),
                    natural_key: NaturalKey::external(CREDENTIAL_KIND, msg.id.clone()),
                })
                .await?;

            let status = if upsert.was_inserted() {
                processed += 1;
                ItemStatus::Processed
            } else {
                ItemStatus::Skipped
            };
            items.push(NormalizedItem::Email(EmailItem {
                subject: msg.subject,
                from: msg.from,
                message_id: msg.id,
                received_at,
                snippet: msg.snippet,
                matched_keywords: matched,
                status,
            }));
        }

        let mut outcome = FetchOutcome::ok(processed, items)
            .with_details(json!({ "filteredOut": filtered_out }));
        if processed == 0 {
            outcome = outcome.with_warning("No new relevant emails found");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_date_millis_convert() {
        let out = millis_to_rfc3339("1754300000000").unwrap();
        assert!(out.starts_with("2025-08-04T"), "got {out}");
        assert!(millis_to_rfc3339("nope").is_none());
    }
}
