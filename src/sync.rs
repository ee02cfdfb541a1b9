// src/sync.rs
//! Scheduled sync: runs the aggregator for every owner with at least one
//! configured source. One owner's failure never stops the sweep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::aggregate::Aggregator;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_sweeps_total", "Scheduled sweeps executed.");
        describe_counter!("sync_owner_failures_total", "Owners whose run failed.");
        describe_gauge!("sync_last_run_ts", "Unix ts when the last sweep ran.");
    });
}

/// Per-owner detail folded into the sweep summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResult {
    pub owner_id: String,
    pub success: bool,
    pub processed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one scheduled sweep across all owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub total_users: usize,
    pub successful_users: usize,
    pub failed_users: usize,
    pub total_items_processed: usize,
    pub duration_seconds: f64,
    pub user_results: Vec<OwnerResult>,
}

/// Run aggregation for every owner with configured sources, sequentially in
/// owner order. A failed owner is recorded with its error and the sweep
/// continues. `deadline_per_owner` bounds each owner's run, not the sweep.
pub async fn run_sweep(
    aggregator: &Aggregator,
    deadline_per_owner: Option<Duration>,
) -> Result<SweepSummary> {
    ensure_metrics_described();
    let started = Instant::now();

    let owners = aggregator
        .context()
        .store
        .owners_with_sources()
        .await
        .context("listing owners with sources")?;

    let mut user_results = Vec::with_capacity(owners.len());
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut total_items = 0usize;

    for owner_id in owners {
        let deadline = deadline_per_owner.map(|d| Instant::now() + d);
        match aggregator.run_for_owner(&owner_id, deadline).await {
            Ok(report) => {
                successful += 1;
                total_items += report.processed_count;
                user_results.push(OwnerResult {
                    owner_id,
                    success: true,
                    processed_count: report.processed_count,
                    error: None,
                });
            }
            Err(e) => {
                failed += 1;
                counter!("sync_owner_failures_total").increment(1);
                tracing::warn!(
                    error = ?e,
                    owner = %crate::aggregate::anon_owner(&owner_id),
                    "owner aggregation failed"
                );
                user_results.push(OwnerResult {
                    owner_id,
                    success: false,
                    processed_count: 0,
                    error: Some(format!("{e:#}")),
                });
            }
        }
    }

    counter!("sync_sweeps_total").increment(1);
    gauge!("sync_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    let summary = SweepSummary {
        total_users: user_results.len(),
        successful_users: successful,
        failed_users: failed,
        total_items_processed: total_items,
        duration_seconds: started.elapsed().as_secs_f64(),
        user_results,
    };
    tracing::info!(
        users = summary.total_users,
        failed = summary.failed_users,
        items = summary.total_items_processed,
        "scheduled sweep complete"
    );
    Ok(summary)
}

#[derive(Clone, Copy, Debug)]
pub struct SyncSchedulerCfg {
    pub interval_secs: u64,
    pub deadline_per_owner_secs: Option<u64>,
}

/// Spawn the interval scheduler driving `run_sweep`.
pub fn spawn_scheduler(aggregator: Arc<Aggregator>, cfg: SyncSchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(60)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let deadline = cfg.deadline_per_owner_secs.map(Duration::from_secs);
            match run_sweep(&aggregator, deadline).await {
                Ok(summary) => {
                    tracing::info!(
                        target: "sync",
                        users = summary.total_users,
                        items = summary.total_items_processed,
                        secs = summary.duration_seconds,
                        "sync tick"
                    );
                }
                Err(e) => {
                    tracing::error!(target: "sync", error = ?e, "sync tick failed");
                }
            }
        }
    })
}
