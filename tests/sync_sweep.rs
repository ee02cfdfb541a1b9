// tests/sync_sweep.rs
//
// Scheduled sweep fault tolerance: one owner whose aggregation fails at the
// datastore level is recorded and the remaining owners still contribute.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use market_minds::aggregate::adapters::rss::RssAdapter;
use market_minds::aggregate::{AdapterRegistry, Aggregator, FetchContext, Source};
use market_minds::oauth::StoredCredentials;
use market_minds::store::{
    ContentItem, ContentStore, MemoryStore, NaturalKey, NewContentItem, SharedStore, UpsertOutcome,
};
use market_minds::summarize::MockSummarizer;
use market_minds::sync::run_sweep;

const RSS_TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Research</title>
    <item>
      <title>Rates outlook</title>
      <guid isPermaLink="false">post-1</guid>
      <link>https://example.com/posts/rates</link>
      <description>Quick take.</description>
    </item>
    <item>
      <title>Earnings primer</title>
      <guid isPermaLink="false">post-2</guid>
      <link>https://example.com/posts/earnings</link>
      <description>Margins.</description>
    </item>
  </channel>
</rss>"#;

/// Delegates to a `MemoryStore` but fails source listing for one owner,
/// which surfaces as that owner's fatal run error.
struct FailingStore {
    inner: MemoryStore,
    poisoned_owner: String,
}

#[async_trait::async_trait]
impl ContentStore for FailingStore {
    async fn exists(&self, owner_id: &str, key: &NaturalKey) -> Result<bool> {
        self.inner.exists(owner_id, key).await
    }

    async fn upsert(&self, item: NewContentItem) -> Result<UpsertOutcome> {
        self.inner.upsert(item).await
    }

    async fn items_for_owner(&self, owner_id: &str) -> Result<Vec<ContentItem>> {
        self.inner.items_for_owner(owner_id).await
    }

    async fn recent_uploads(&self, owner_id: &str, max_items: usize) -> Result<Vec<ContentItem>> {
        self.inner.recent_uploads(owner_id, max_items).await
    }

    async fn save_source(&self, source: &Source) -> Result<()> {
        self.inner.save_source(source).await
    }

    async fn sources_for_owner(&self, owner_id: &str) -> Result<Vec<Source>> {
        if owner_id == self.poisoned_owner {
            return Err(anyhow!("datastore unavailable for {owner_id}"));
        }
        self.inner.sources_for_owner(owner_id).await
    }

    async fn owners_with_sources(&self) -> Result<Vec<String>> {
        self.inner.owners_with_sources().await
    }

    async fn load_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
    ) -> Result<Option<StoredCredentials>> {
        self.inner.load_credentials(owner_id, source_kind).await
    }

    async fn save_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
        creds: &StoredCredentials,
    ) -> Result<()> {
        self.inner
            .save_credentials(owner_id, source_kind, creds)
            .await
    }
}

fn rss_source(owner: &str) -> Source {
    Source {
        id: format!("src-{owner}"),
        owner_id: owner.to_string(),
        source_name: "Jane Quant".to_string(),
        selected_platforms: vec!["rss".to_string()],
        platform_identifiers: HashMap::from([(
            "rss".to_string(),
            "https://example.com/feed".to_string(),
        )]),
    }
}

#[tokio::test]
async fn one_failed_owner_does_not_stop_the_sweep() {
    let store = FailingStore {
        inner: MemoryStore::new(),
        poisoned_owner: "u2".to_string(),
    };
    for owner in ["u1", "u2", "u3"] {
        store.save_source(&rss_source(owner)).await.unwrap();
    }
    let store: SharedStore = Arc::new(store);

    let registry = AdapterRegistry::new().register(Arc::new(RssAdapter::from_fixture(RSS_TWO_ITEMS)));
    let ctx = FetchContext::new(store, Arc::new(MockSummarizer::default()));
    let aggregator = Aggregator::new(registry, ctx);

    let summary = run_sweep(&aggregator, None).await.unwrap();
    assert_eq!(summary.total_users, 3);
    assert_eq!(summary.successful_users, 2);
    assert_eq!(summary.failed_users, 1);
    // The healthy owners still contribute their processed items.
    assert_eq!(summary.total_items_processed, 4);

    let poisoned = summary
        .user_results
        .iter()
        .find(|r| r.owner_id == "u2")
        .expect("failed owner is reported");
    assert!(!poisoned.success);
    assert!(poisoned
        .error
        .as_deref()
        .unwrap_or("")
        .contains("datastore unavailable"));

    for owner in ["u1", "u3"] {
        let detail = summary
            .user_results
            .iter()
            .find(|r| r.owner_id == owner)
            .unwrap();
        assert!(detail.success);
        assert_eq!(detail.processed_count, 2);
    }
}

#[tokio::test]
async fn sweep_over_no_owners_is_an_empty_summary() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let registry = AdapterRegistry::new().register(Arc::new(RssAdapter::from_fixture(RSS_TWO_ITEMS)));
    let ctx = FetchContext::new(store, Arc::new(MockSummarizer::default()));
    let aggregator = Aggregator::new(registry, ctx);

    let summary = run_sweep(&aggregator, None).await.unwrap();
    assert_eq!(summary.total_users, 0);
    assert_eq!(summary.total_items_processed, 0);
    assert!(summary.user_results.is_empty());
}
