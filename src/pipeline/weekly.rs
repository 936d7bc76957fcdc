// src/pipeline/weekly.rs

//! Scheduled end-to-end refresh.
//!
//! One cycle: delta sync for the past week, reconcile the window into the
//! "latest" snapshot, publish it to the serving bucket, and bounce the
//! serving instances. Sync and reconciliation failures abort the cycle;
//! publication and refresh failures are downgraded to a warning, because
//! the previously published snapshot keeps serving either way.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{DeltaWindow, RunSummary, SyncMode};
use crate::pipeline::checkpoint::CheckpointStore;
use crate::pipeline::publish::{RefreshController, SnapshotPublisher};
use crate::pipeline::reconcile::{ReconcileOutcome, Reconciler};
use crate::pipeline::sync::Orchestrator;

/// Result of one scheduled cycle.
#[derive(Debug, Clone)]
pub struct WeeklyOutcome {
    pub run_id: String,
    pub summary: RunSummary,
    pub reconcile: ReconcileOutcome,
    /// False when publication or the serving refresh failed and the
    /// previous snapshot is still the one being served.
    pub published: bool,
}

/// Composes sync, reconciliation, publication and refresh into one cycle.
pub struct WeeklyPipeline {
    orchestrator: Orchestrator,
    checkpoints: CheckpointStore,
    reconciler: Reconciler,
    publisher: SnapshotPublisher,
    refresher: RefreshController,
}

impl WeeklyPipeline {
    pub fn new(
        orchestrator: Orchestrator,
        checkpoints: CheckpointStore,
        reconciler: Reconciler,
        publisher: SnapshotPublisher,
        refresher: RefreshController,
    ) -> Self {
        Self {
            orchestrator,
            checkpoints,
            reconciler,
            publisher,
            refresher,
        }
    }

    pub async fn run(&mut self) -> Result<WeeklyOutcome> {
        let (run_id, summary) = self
            .orchestrator
            .start(SyncMode::Delta(DeltaWindow::Week))
            .await?;

        let date = match self.checkpoints.load(&run_id).await? {
            Some(state) => state.window_date(),
            None => Utc::now().format("%Y-%m-%d").to_string(),
        };
        let reconcile = self.reconciler.reconcile_window(&date).await?;

        let published = match self.publish_and_refresh().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Publish/refresh failed; previous snapshot keeps serving");
                false
            }
        };

        info!(
            run_id = %run_id,
            fetched = summary.succeeded,
            reconciled = reconcile.inserted,
            published,
            "Weekly cycle finished"
        );
        Ok(WeeklyOutcome {
            run_id,
            summary,
            reconcile,
            published,
        })
    }

    async fn publish_and_refresh(&self) -> Result<()> {
        self.publisher.publish_latest().await?;
        self.refresher.refresh().await
    }
}
