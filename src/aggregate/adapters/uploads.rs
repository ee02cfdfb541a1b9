// src/aggregate/adapters/uploads.rs
//! Uploads adapter: no external fetch. Lists already-persisted items with
//! the upload platform for the owner, newest first. Nothing is newly
//! ingested here, so `processed_items` stays zero.

use anyhow::Result;

use crate::aggregate::types::{
    FetchContext, FetchOutcome, NormalizedItem, Source, SourceAdapter, UploadItem,
};
use crate::platform::Platform;

#[derive(Default)]
pub struct UploadsAdapter;

impl UploadsAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl SourceAdapter for UploadsAdapter {
    fn platform(&self) -> Platform {
        Platform::Uploads
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        _identifier: Option<&str>,
    ) -> Result<FetchOutcome> {
        let uploads = ctx
            .store
            .recent_uploads(&source.owner_id, ctx.max_items)
            .await?;

        if uploads.is_empty() {
            return Ok(FetchOutcome::empty("No uploaded documents found"));
        }

        let items = uploads
            .into_iter()
            .map(|item| {
                NormalizedItem::Upload(UploadItem {
                    title: item.title,
                    content_id: item.id,
                    created_at: item.created_at,
                })
            })
            .collect();
        Ok(FetchOutcome::ok(0, items))
    }
}
