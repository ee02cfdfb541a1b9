// src/aggregate/mod.rs
//! The aggregation orchestrator: fans out across the owner's configured
//! (source, platform) pairs, isolates every failure to its pair, and folds
//! the outcomes into one `RunReport`.

pub mod adapters;
pub mod dispatch;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::platform;

pub use dispatch::AdapterRegistry;
pub use types::{FetchContext, FetchOutcome, NormalizedItem, Source, SourceAdapter};

use types::SharedAdapter;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("aggregate_runs_total", "Aggregation runs started.");
        describe_counter!(
            "aggregate_pairs_total",
            "(source, platform) pairs attempted."
        );
        describe_counter!(
            "aggregate_pair_errors_total",
            "Pairs that ended in a failed outcome."
        );
        describe_counter!(
            "aggregate_items_processed_total",
            "Content items newly persisted by runs."
        );
        describe_histogram!("aggregate_fetch_ms", "Adapter fetch time in milliseconds.");
    });
}

/// Anonymized owner id for logs; raw owner identifiers stay out of traces.
pub(crate) fn anon_owner(owner_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// One record per (source, platform) pair attempted in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationOutcome {
    pub source_id: String,
    pub source_name: String,
    pub platform: String,
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

impl AggregationOutcome {
    fn from_fetch(source: &Source, platform_key: &str, fetch: FetchOutcome) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.source_name.clone(),
            platform: platform_key.to_string(),
            success: fetch.success,
            processed_items: fetch.processed_items,
            items: fetch.items,
            error: fetch.error,
            warnings: fetch.warnings,
            details: fetch.details,
        }
    }
}

/// Aggregate result of one run for one owner.
///
/// `success` stays true even when every pair failed: the run itself did not
/// crash, and callers inspect `results[].success` per pair. Only a datastore
/// failure before the loop starts surfaces as a top-level error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub processed_count: usize,
    pub results: Vec<AggregationOutcome>,
}

pub struct Aggregator {
    registry: AdapterRegistry,
    ctx: FetchContext,
    concurrency: usize,
    pair_timeout: Duration,
}

impl Aggregator {
    pub fn new(registry: AdapterRegistry, ctx: FetchContext) -> Self {
        Self {
            registry,
            ctx,
            concurrency: 4,
            pair_timeout: Duration::from_secs(30),
        }
    }

    /// Width of the bounded fan-out pool.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_pair_timeout(mut self, timeout: Duration) -> Self {
        self.pair_timeout = timeout;
        self
    }

    pub fn context(&self) -> &FetchContext {
        &self.ctx
    }

    /// Run aggregation for one owner. Reads the owner's sources fresh, then
    /// attempts every (source, selected platform) pair exactly once through
    /// the bounded pool. Per-pair failures are recorded and never abort the
    /// run; an expired deadline skips the remaining fetches but still
    /// returns the partial results.
    pub async fn run_for_owner(
        &self,
        owner_id: &str,
        deadline: Option<Instant>,
    ) -> Result<RunReport> {
        ensure_metrics_described();
        counter!("aggregate_runs_total").increment(1);

        let sources = self
            .ctx
            .store
            .sources_for_owner(owner_id)
            .await
            .context("loading sources for owner")?;

        let mut pairs = Vec::new();
        for source in sources {
            for raw in &source.selected_platforms {
                pairs.push((source.clone(), raw.clone()));
            }
        }

        let results: Vec<AggregationOutcome> = stream::iter(pairs)
            .map(|(source, raw)| self.attempt_pair(source, raw, deadline))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let processed_count: usize = results.iter().map(|r| r.processed_items).sum();
        counter!("aggregate_items_processed_total").increment(processed_count as u64);
        tracing::info!(
            owner = %anon_owner(owner_id),
            pairs = results.len(),
            processed = processed_count,
            "aggregation run complete"
        );

        Ok(RunReport {
            success: true,
            processed_count,
            results,
        })
    }

    async fn attempt_pair(
        &self,
        source: Source,
        raw_platform: String,
        deadline: Option<Instant>,
    ) -> AggregationOutcome {
        counter!("aggregate_pairs_total").increment(1);
        let normalized = platform::normalize(&raw_platform);

        if let Some(d) = deadline {
            if Instant::now() >= d {
                counter!("aggregate_pair_errors_total").increment(1);
                return AggregationOutcome::from_fetch(
                    &source,
                    &normalized,
                    FetchOutcome::failed("run deadline exceeded before fetch"),
                );
            }
        }

        let Some((platform, adapter)) = self.registry.resolve(&raw_platform) else {
            counter!("aggregate_pair_errors_total").increment(1);
            return AggregationOutcome::from_fetch(
                &source,
                &normalized,
                FetchOutcome::failed(format!("no handler for platform '{raw_platform}'")),
            );
        };
        let identifier = source
            .identifier_for(&normalized, &raw_platform)
            .map(str::to_string);

        let t0 = Instant::now();
        let fetched = tokio::time::timeout(
            self.pair_timeout,
            adapter.fetch(&self.ctx, &source, identifier.as_deref()),
        )
        .await;
        histogram!("aggregate_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let outcome = match fetched {
            Err(_) => FetchOutcome::failed(format!(
                "fetch timed out after {}s",
                self.pair_timeout.as_secs()
            )),
            Ok(Err(e)) => {
                tracing::warn!(
                    error = ?e,
                    source = %source.source_name,
                    platform = %platform,
                    "adapter error"
                );
                FetchOutcome::failed(format!("{e:#}"))
            }
            Ok(Ok(outcome)) => outcome,
        };
        if !outcome.success {
            counter!("aggregate_pair_errors_total").increment(1);
        }
        AggregationOutcome::from_fetch(&source, platform.as_str(), outcome)
    }
}

/// Registry wiring for the production adapter set. Tests assemble their own
/// registries from fixtures instead.
pub fn default_registry(
    youtube_api_key: Option<String>,
    slack_bot_token: Option<String>,
    oauth: Option<crate::oauth::OAuthConfig>,
    keyword_filter: crate::relevance::KeywordFilter,
) -> AdapterRegistry {
    let adapters: Vec<SharedAdapter> = vec![
        Arc::new(adapters::youtube::YoutubeAdapter::new(youtube_api_key)),
        Arc::new(adapters::rss::RssAdapter::new()),
        Arc::new(adapters::reddit::RedditAdapter::new()),
        Arc::new(adapters::twitter::TwitterAdapter::new()),
        Arc::new(adapters::slack::SlackAdapter::new(slack_bot_token)),
        Arc::new(adapters::email::EmailAdapter::new(oauth, keyword_filter)),
        Arc::new(adapters::podcast::PodcastAdapter::new()),
        Arc::new(adapters::uploads::UploadsAdapter::new()),
    ];
    adapters
        .into_iter()
        .fold(AdapterRegistry::new(), |reg, a| reg.register(a))
}
