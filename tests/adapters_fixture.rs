// tests/adapters_fixture.rs
//
// Adapter mapping logic over canned provider payloads: YouTube dedup +
// summarization statuses, Slack history mapping, the Gmail keyword gate,
// podcast duration/enclosure extraction, and Twitter id fallback.

use std::collections::HashMap;
use std::sync::Arc;

use market_minds::aggregate::adapters::email::EmailAdapter;
use market_minds::aggregate::adapters::podcast::PodcastAdapter;
use market_minds::aggregate::adapters::slack::SlackAdapter;
use market_minds::aggregate::adapters::twitter::TwitterAdapter;
use market_minds::aggregate::adapters::youtube::YoutubeAdapter;
use market_minds::aggregate::types::{FetchContext, ItemStatus, NormalizedItem, Source, SourceAdapter};
use market_minds::relevance::KeywordFilter;
use market_minds::store::{MemoryStore, SharedStore};
use market_minds::summarize::{DisabledSummarizer, MockSummarizer, SharedSummarizer};

fn source(owner: &str) -> Source {
    Source {
        id: format!("src-{owner}"),
        owner_id: owner.to_string(),
        source_name: "Jane Quant".to_string(),
        selected_platforms: Vec::new(),
        platform_identifiers: HashMap::new(),
    }
}

fn ctx_with(summarizer: SharedSummarizer) -> FetchContext {
    let store: SharedStore = Arc::new(MemoryStore::new());
    FetchContext::new(store, summarizer)
}

const YT_SEARCH: &str = r#"{
  "items": [
    {"id": {"videoId": "vid1"},
     "snippet": {"title": "Macro update", "description": "CPI and rates", "publishedAt": "2026-08-01T10:00:00Z"}},
    {"id": {"videoId": "vid2"},
     "snippet": {"title": "Earnings recap", "description": "Big tech margins", "publishedAt": "2026-08-02T10:00:00Z"}}
  ]
}"#;

#[tokio::test]
async fn youtube_processes_then_skips_already_seen_videos() {
    let adapter = YoutubeAdapter::from_fixture(YT_SEARCH);
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));
    let src = source("u1");

    let first = adapter.fetch(&ctx, &src, Some("UCchannel")).await.unwrap();
    assert!(first.success);
    assert_eq!(first.processed_items, 2);
    for item in &first.items {
        let NormalizedItem::Video(video) = item else {
            panic!("expected video items");
        };
        assert_eq!(video.status, ItemStatus::Processed);
        assert!(video.content_id.is_some());
        assert!(video.url.starts_with("https://www.youtube.com/watch?v="));
    }

    let second = adapter.fetch(&ctx, &src, Some("UCchannel")).await.unwrap();
    assert_eq!(second.processed_items, 0);
    for item in &second.items {
        let NormalizedItem::Video(video) = item else {
            panic!("expected video items");
        };
        assert_eq!(video.status, ItemStatus::Skipped);
        assert_eq!(video.reason.as_deref(), Some("Already processed"));
    }
    assert!(second.warnings.iter().any(|w| w.contains("No new videos")));
}

#[tokio::test]
async fn youtube_summarizer_failure_marks_items_errored() {
    let adapter = YoutubeAdapter::from_fixture(YT_SEARCH);
    let ctx = ctx_with(Arc::new(DisabledSummarizer));
    let src = source("u1");

    let outcome = adapter.fetch(&ctx, &src, Some("UCchannel")).await.unwrap();
    assert!(outcome.success, "item errors are not an adapter failure");
    assert!(outcome.error.is_none());
    assert_eq!(outcome.processed_items, 0);
    assert!(outcome.items.iter().all(|it| it.status() == Some(ItemStatus::Error)));
    // Errors, not emptiness: no "No new videos" warning.
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn youtube_without_api_key_is_a_recoverable_config_failure() {
    let adapter = YoutubeAdapter::new(None);
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));
    let outcome = adapter
        .fetch(&ctx, &source("u1"), Some("UCchannel"))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap_or("").contains("not configured"));
}

const SLACK_HISTORY: &str = r#"{
  "ok": true,
  "messages": [
    {"type": "message", "text": "CPI print tomorrow", "user": "U123", "ts": "1754300000.000100"},
    {"type": "message", "text": "Watching rates", "user": "U456", "ts": "1754300100.000200"}
  ]
}"#;

#[tokio::test]
async fn slack_maps_history_and_dedups_on_ts() {
    let adapter = SlackAdapter::from_fixture(SLACK_HISTORY);
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));
    let src = source("u1");

    let first = adapter.fetch(&ctx, &src, Some("C0GENERAL")).await.unwrap();
    assert!(first.success);
    assert_eq!(first.processed_items, 2);
    let NormalizedItem::Message(msg) = &first.items[0] else {
        panic!("expected message items");
    };
    assert_eq!(msg.user.as_deref(), Some("U123"));
    assert!(msg
        .published_at
        .as_deref()
        .unwrap_or("")
        .starts_with("2025-08-04T"));

    let second = adapter.fetch(&ctx, &src, Some("C0GENERAL")).await.unwrap();
    assert_eq!(second.processed_items, 0);
    assert!(second.warnings.iter().any(|w| w.contains("No new")));
}

#[tokio::test]
async fn slack_without_token_and_api_errors_are_recoverable() {
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));

    let unconfigured = SlackAdapter::new(None);
    let outcome = unconfigured
        .fetch(&ctx, &source("u1"), Some("C0GENERAL"))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap_or("").contains("not configured"));

    let api_error = SlackAdapter::from_fixture(r#"{"ok": false, "error": "invalid_auth"}"#);
    let outcome = api_error
        .fetch(&ctx, &source("u1"), Some("C0GENERAL"))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap_or("").contains("invalid_auth"));
}

const INBOX: &str = r#"[
  {"id": "m1", "subject": "Earnings preview for the week", "from": "news@research.example",
   "snippet": "Margins, guidance, the Fed", "internalDate": "1754300000000"},
  {"id": "m2", "subject": "Dinner on Friday?", "from": "friend@example.com",
   "snippet": "There is a new place downtown", "internalDate": "1754300000000"}
]"#;

#[tokio::test]
async fn email_admits_only_keyword_relevant_messages() {
    let adapter = EmailAdapter::from_fixture(INBOX, KeywordFilter::default());
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));
    let src = source("u1");

    let outcome = adapter.fetch(&ctx, &src, None).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.processed_items, 1);
    assert_eq!(outcome.items.len(), 1);
    let NormalizedItem::Email(email) = &outcome.items[0] else {
        panic!("expected email items");
    };
    assert_eq!(email.message_id, "m1");
    assert!(email.matched_keywords.contains(&"earnings".to_string()));
    assert_eq!(
        outcome.details.as_ref().unwrap()["filteredOut"],
        serde_json::json!(1)
    );

    // Unchanged inbox: the relevant message is already persisted.
    let rerun = adapter.fetch(&ctx, &src, None).await.unwrap();
    assert_eq!(rerun.processed_items, 0);
    assert!(rerun.warnings.iter().any(|w| w.contains("No new")));
}

const PODCAST_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Macro Pod</title>
    <item>
      <title>Episode 12: The long pause</title>
      <link>https://pod.example.com/ep12</link>
      <guid isPermaLink="false">ep-12</guid>
      <pubDate>Mon, 03 Aug 2026 06:00:00 GMT</pubDate>
      <description>Rates, curves, carry.</description>
      <enclosure url="https://cdn.example.com/ep12.mp3" type="audio/mpeg" length="1234"/>
      <itunes:duration>01:02:03</itunes:duration>
    </item>
    <item>
      <title>Episode 13: Shorts</title>
      <link>https://pod.example.com/ep13</link>
      <guid isPermaLink="false">ep-13</guid>
      <description>Quick hits.</description>
      <enclosure url="https://cdn.example.com/ep13.mp3" type="audio/mpeg" length="999"/>
      <itunes:duration>05:30</itunes:duration>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn podcast_extracts_duration_and_audio_url() {
    let adapter = PodcastAdapter::from_fixture(PODCAST_FEED);
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));
    let outcome = adapter
        .fetch(&ctx, &source("u1"), Some("https://pod.example.com/feed"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.processed_items, 2);
    let NormalizedItem::Episode(ep) = &outcome.items[0] else {
        panic!("expected episode items");
    };
    assert_eq!(ep.duration_seconds, Some(3723));
    assert_eq!(ep.audio_url.as_deref(), Some("https://cdn.example.com/ep12.mp3"));
    let NormalizedItem::Episode(ep) = &outcome.items[1] else {
        panic!("expected episode items");
    };
    assert_eq!(ep.duration_seconds, Some(330));
}

const TWITTER_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>@janequant</title>
    <item>
      <title>Positioning into CPI</title>
      <link>https://mirror.example/janequant/status/1</link>
      <guid>tweet-1</guid>
      <description>Short gamma, long patience.</description>
    </item>
    <item>
      <title>Second tweet with no guid</title>
      <link>https://mirror.example/janequant/status/2</link>
      <description>Link-only id.</description>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn twitter_strips_handle_and_falls_back_through_ids() {
    let adapter = TwitterAdapter::from_fixture(TWITTER_FEED);
    let ctx = ctx_with(Arc::new(MockSummarizer::default()));
    let outcome = adapter
        .fetch(&ctx, &source("u1"), Some("@janequant"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.processed_items, 2);
    let NormalizedItem::Post(post) = &outcome.items[0] else {
        panic!("expected post items");
    };
    assert_eq!(post.external_id, "tweet-1");
    assert_eq!(post.author.as_deref(), Some("@janequant"));
    let NormalizedItem::Post(post) = &outcome.items[1] else {
        panic!("expected post items");
    };
    // No guid: the id falls back to the title before the link.
    assert_eq!(post.external_id, "Second tweet with no guid");
}
