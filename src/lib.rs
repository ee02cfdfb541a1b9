// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod config;
pub mod feed;
pub mod metrics;
pub mod oauth;
pub mod platform;
pub mod relevance;
pub mod store;
pub mod summarize;
pub mod sync;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{
    default_registry, AdapterRegistry, AggregationOutcome, Aggregator, FetchContext, FetchOutcome,
    NormalizedItem, RunReport, Source, SourceAdapter,
};
pub use crate::api::{router, AppState};
pub use crate::store::{ContentItem, ContentStore, MemoryStore, NaturalKey, SqliteStore};
pub use crate::summarize::{MockSummarizer, Sentiment, Summarizer, Summary};
pub use crate::sync::{run_sweep, SweepSummary};
