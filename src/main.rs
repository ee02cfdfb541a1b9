//! Market Minds Aggregation Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the content store, adapter registry,
//! background sync scheduler, and middleware.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_minds::aggregate::{default_registry, Aggregator, FetchContext};
use market_minds::api::{self, AppState};
use market_minds::config::{load_owner_tokens_default, AppConfig};
use market_minds::metrics::Metrics;
use market_minds::oauth::OAuthConfig;
use market_minds::relevance::KeywordFilter;
use market_minds::store::{SharedStore, SqliteStore};
use market_minds::summarize::build_summarizer;
use market_minds::sync::{spawn_scheduler, SyncSchedulerCfg};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - AGGREGATOR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("AGGREGATOR_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("market_minds=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let cfg = AppConfig::from_env();

    // Missing/broken datastore configuration is the one fatal startup error:
    // nothing runs without the dedup gate.
    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .expect("content store connect");
    let store: SharedStore = Arc::new(store);

    let metrics = Metrics::init();

    let registry = default_registry(
        cfg.youtube_api_key.clone(),
        cfg.slack_bot_token.clone(),
        OAuthConfig::from_env(),
        KeywordFilter::load_default(),
    );
    let ctx = FetchContext::new(store, build_summarizer()).with_max_items(cfg.max_items);
    let aggregator = Arc::new(
        Aggregator::new(registry, ctx)
            .with_concurrency(cfg.fetch_concurrency)
            .with_pair_timeout(Duration::from_secs(cfg.pair_timeout_secs)),
    );

    if let Some(interval_secs) = cfg.sync_interval_secs {
        spawn_scheduler(
            aggregator.clone(),
            SyncSchedulerCfg {
                interval_secs,
                deadline_per_owner_secs: cfg.run_deadline_secs,
            },
        );
    }

    let owner_tokens = load_owner_tokens_default().unwrap_or_default();
    let state = AppState::new(
        aggregator,
        cfg.scheduler_secrets.clone(),
        owner_tokens,
        cfg.run_deadline_secs.map(Duration::from_secs),
    );

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
