// src/aggregate/dispatch.rs
//! Adapter registry: normalized platform key -> adapter.
//!
//! `resolve` returns `None` for an unregistered platform instead of erroring;
//! the aggregation loop records that as a failed outcome and moves on.

use std::collections::HashMap;

use crate::platform::{self, Platform};

use super::types::SharedAdapter;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, SharedAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the adapter's own platform key; the last registration
    /// for a key wins.
    pub fn register(mut self, adapter: SharedAdapter) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    /// Normalize a raw key (synonyms included) and look up its adapter.
    pub fn resolve(&self, raw: &str) -> Option<(Platform, &SharedAdapter)> {
        let normalized = platform::normalize(raw);
        let platform = Platform::parse(&normalized)?;
        self.adapters.get(&platform).map(|a| (platform, a))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;

    use super::*;
    use crate::aggregate::types::{FetchContext, FetchOutcome, Source, SourceAdapter};

    struct NullAdapter(Platform);

    #[async_trait::async_trait]
    impl SourceAdapter for NullAdapter {
        fn platform(&self) -> Platform {
            self.0
        }

        async fn fetch(
            &self,
            _ctx: &FetchContext,
            _source: &Source,
            _identifier: Option<&str>,
        ) -> Result<FetchOutcome> {
            Ok(FetchOutcome::empty("nothing"))
        }
    }

    #[test]
    fn resolve_follows_the_synonym_table() {
        let registry = AdapterRegistry::new()
            .register(Arc::new(NullAdapter(Platform::Rss)))
            .register(Arc::new(NullAdapter(Platform::Podcasts)));

        assert_eq!(registry.resolve("newsletters").unwrap().0, Platform::Rss);
        assert_eq!(registry.resolve("substack").unwrap().0, Platform::Rss);
        assert_eq!(registry.resolve("podcast").unwrap().0, Platform::Podcasts);
    }

    #[test]
    fn unknown_and_unregistered_keys_resolve_to_none() {
        let registry = AdapterRegistry::new().register(Arc::new(NullAdapter(Platform::Rss)));
        assert!(registry.resolve("myspace").is_none());
        // Known platform, no adapter registered for it.
        assert!(registry.resolve("youtube").is_none());
    }
}
