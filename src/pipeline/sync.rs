// src/pipeline/sync.rs

//! Fan-out/fan-in sync orchestrator.
//!
//! Drives the multi-stage workflow `ListingIds -> Diffing ->
//! FetchingFanOut -> Aggregating -> Completed | Failed` as an explicit,
//! persisted state machine. Every step with an externally visible side
//! effect records its outcome durably before the workflow advances, so
//! replay after a restart skips already-completed steps instead of
//! re-executing them.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{RunPhase, RunState, RunSummary, SyncMode};
use crate::pipeline::checkpoint::CheckpointStore;
use crate::pipeline::diff::{expand_catalogue, plan_tasks};
use crate::services::catalogue::CatalogueSource;
use crate::services::fetcher::Fetcher;
use crate::storage::{ObjectStore, paths, put_json};

/// Orchestrates one sync run end to end.
pub struct Orchestrator {
    catalogue: Arc<dyn CatalogueSource>,
    fetcher: Arc<Fetcher>,
    store: Arc<dyn ObjectStore>,
    checkpoints: CheckpointStore,
    domain: String,
    locales: Vec<String>,
    primary_locale: String,
    concurrency: usize,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalogue: Arc<dyn CatalogueSource>,
        fetcher: Arc<Fetcher>,
        store: Arc<dyn ObjectStore>,
        domain: impl Into<String>,
        locales: Vec<String>,
        primary_locale: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        let checkpoints = CheckpointStore::new(Arc::clone(&store));
        Self {
            catalogue,
            fetcher,
            store,
            checkpoints,
            domain: domain.into(),
            locales,
            primary_locale: primary_locale.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Start a new run. Returns the run id (the status-check handle) and
    /// the final summary.
    pub async fn start(&self, mode: SyncMode) -> Result<(String, RunSummary)> {
        let run_id = format!("run-{}", Utc::now().format("%Y%m%d%H%M%S%3f"));
        let mut state = RunState::new(&run_id, mode);
        self.checkpoints.save(&mut state).await?;
        info!(run_id = %run_id, mode = ?mode, "Sync run started");

        let summary = self.drive(&mut state).await?;
        Ok((run_id, summary))
    }

    /// Resume a checkpointed run after a restart.
    pub async fn resume(&self, run_id: &str) -> Result<RunSummary> {
        let mut state = self
            .checkpoints
            .load(run_id)
            .await?
            .ok_or_else(|| AppError::orchestration(format!("unknown run id {run_id}")))?;
        info!(run_id = %run_id, phase = ?state.phase, "Resuming sync run");
        self.drive(&mut state).await
    }

    /// Advance the state machine until a terminal phase.
    async fn drive(&self, state: &mut RunState) -> Result<RunSummary> {
        loop {
            match state.phase {
                RunPhase::ListingIds => {
                    if let Err(e) = self.list_ids(state).await {
                        // Nothing downstream is valid without a catalogue.
                        state.fail(e.to_string());
                        self.checkpoints.save(state).await?;
                        return Err(e);
                    }
                    state.phase = RunPhase::Diffing;
                    self.checkpoints.save(state).await?;
                }
                RunPhase::Diffing => {
                    let date = state.window_date();
                    state.tasks = plan_tasks(
                        &state.catalogue,
                        self.store.as_ref(),
                        &state.mode,
                        &date,
                    )
                    .await?;
                    info!(
                        run_id = %state.run_id,
                        tasks = state.tasks.len(),
                        "Diff complete"
                    );
                    state.phase = RunPhase::FetchingFanOut;
                    self.checkpoints.save(state).await?;
                }
                RunPhase::FetchingFanOut | RunPhase::Aggregating => {
                    state.phase = RunPhase::Aggregating;
                    self.checkpoints.save(state).await?;
                    self.fan_out(state).await;

                    let summary = state.current_summary();
                    state.summary = Some(summary);
                    state.phase = RunPhase::Completed;
                    self.checkpoints.save(state).await?;
                }
                RunPhase::Completed => {
                    let summary = state.summary.unwrap_or_else(|| state.current_summary());
                    info!(
                        run_id = %state.run_id,
                        attempted = summary.attempted,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        "Sync run completed"
                    );
                    return Ok(summary);
                }
                RunPhase::Failed => {
                    let detail = state.error.clone().unwrap_or_default();
                    return Err(AppError::orchestration(format!(
                        "run {} failed: {detail}",
                        state.run_id
                    )));
                }
            }
        }
    }

    /// ListingIds: one catalogue listing call, durably captured.
    async fn list_ids(&self, state: &mut RunState) -> Result<()> {
        let entries = self
            .catalogue
            .list(&self.primary_locale, &state.mode)
            .await?;

        let date = state.window_date();
        put_json(
            self.store.as_ref(),
            &paths::catalogue_capture_key(&date),
            &entries,
        )
        .await?;

        info!(
            run_id = %state.run_id,
            entries = entries.len(),
            "Catalogue listed"
        );
        state.catalogue = expand_catalogue(&entries, &self.locales, &self.domain);
        Ok(())
    }

    /// Fan out pending fetch tasks and fan back in.
    ///
    /// Each task is independent; one task's failure never cancels its
    /// siblings. Failures are recorded as counts, not raised.
    async fn fan_out(&self, state: &mut RunState) {
        let pending = state.pending_tasks();
        if pending.is_empty() {
            return;
        }
        info!(
            run_id = %state.run_id,
            pending = pending.len(),
            concurrency = self.concurrency,
            "Fanning out fetch tasks"
        );

        let mut results = stream::iter(pending.into_iter().map(|task| {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                let result = fetcher.fetch_and_store(&task).await;
                (task, result)
            }
        }))
        .buffer_unordered(self.concurrency);

        while let Some((task, result)) = results.next().await {
            match result {
                Ok(_) => {
                    state.failed_keys.remove(&task.destination_key);
                    state.completed_keys.insert(task.destination_key);
                }
                Err(e) => {
                    warn!(
                        run_id = %state.run_id,
                        key = %task.destination_key,
                        error = %e,
                        "Fetch task failed"
                    );
                    state.failed_keys.insert(task.destination_key, e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::models::CatalogueEntry;
    use crate::services::catalogue::PageFetch;
    use crate::services::fetcher::RetryPolicy;
    use crate::storage::LocalStore;

    const DOMAIN: &str = "https://plus-test.ssc-spc.gc.ca";

    struct FixedCatalogue {
        entries: Vec<CatalogueEntry>,
        fail: bool,
    }

    #[async_trait]
    impl CatalogueSource for FixedCatalogue {
        async fn list(&self, _locale: &str, _mode: &SyncMode) -> Result<Vec<CatalogueEntry>> {
            if self.fail {
                Err(AppError::orchestration("catalogue listing failed: 502"))
            } else {
                Ok(self.entries.clone())
            }
        }
    }

    struct CountingFetch {
        calls: AtomicU32,
        fail_urls: Vec<String>,
    }

    impl CountingFetch {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_urls: Vec::new(),
            }
        }

        fn failing_on(url: &str) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_urls: vec![url.to_string()],
            }
        }
    }

    #[async_trait]
    impl PageFetch for CountingFetch {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_urls.iter().any(|u| u == url) {
                Err(AppError::transient(url, "connection reset"))
            } else {
                Ok(format!(r#"{{"title":"page","url":"{url}"}}"#).into_bytes())
            }
        }
    }

    fn catalogue_entries() -> Vec<CatalogueEntry> {
        vec![
            CatalogueEntry {
                nid: "336".to_string(),
                content_type: "article".to_string(),
            },
            CatalogueEntry {
                nid: "534".to_string(),
                content_type: "gigabit".to_string(),
            },
        ]
    }

    fn orchestrator(
        store: Arc<dyn ObjectStore>,
        source: Arc<CountingFetch>,
        catalogue: FixedCatalogue,
    ) -> Orchestrator {
        let fetcher = Arc::new(Fetcher::new(
            source,
            Arc::clone(&store),
            RetryPolicy::new(2, Duration::from_millis(1)),
        ));
        Orchestrator::new(
            Arc::new(catalogue),
            fetcher,
            store,
            DOMAIN,
            vec!["en".to_string(), "fr".to_string()],
            "en",
            4,
        )
    }

    #[tokio::test]
    async fn full_sync_fetches_every_item_locale_pair() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let source = Arc::new(CountingFetch::new());
        let orch = orchestrator(
            Arc::clone(&store),
            Arc::clone(&source),
            FixedCatalogue {
                entries: catalogue_entries(),
                fail: false,
            },
        );

        let (run_id, summary) = orch.start(SyncMode::Full).await.unwrap();
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 0);

        // All four destination keys exist exactly once.
        let state = CheckpointStore::new(Arc::clone(&store))
            .load(&run_id)
            .await
            .unwrap()
            .unwrap();
        let date = state.window_date();
        let keys = store
            .list_keys(&format!("preload/{date}/"))
            .await
            .unwrap();
        let payload_keys: Vec<_> = keys
            .iter()
            .filter(|k| paths::parse_raw_payload_key(k).is_some())
            .collect();
        assert_eq!(payload_keys.len(), 4);
        assert_eq!(state.phase, RunPhase::Completed);
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_run() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let source = Arc::new(CountingFetch::new());
        let orch = orchestrator(
            Arc::clone(&store),
            Arc::clone(&source),
            FixedCatalogue {
                entries: Vec::new(),
                fail: true,
            },
        );

        let err = orch.start(SyncMode::Full).await.unwrap_err();
        assert!(matches!(err, AppError::Orchestration(_)));
        // No fetch was attempted.
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn per_item_failure_does_not_abort_siblings() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let bad_url = format!("{DOMAIN}/fr/rest/page-by-id/534");
        let source = Arc::new(CountingFetch::failing_on(&bad_url));
        let orch = orchestrator(
            Arc::clone(&store),
            Arc::clone(&source),
            FixedCatalogue {
                entries: catalogue_entries(),
                fail: false,
            },
        );

        let (_, summary) = orch.start(SyncMode::Full).await.unwrap();
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn resume_skips_completed_work() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let source = Arc::new(CountingFetch::new());
        let orch = orchestrator(
            Arc::clone(&store),
            Arc::clone(&source),
            FixedCatalogue {
                entries: catalogue_entries(),
                fail: false,
            },
        );

        let (run_id, _) = orch.start(SyncMode::Full).await.unwrap();
        let calls_after_first = source.calls.load(Ordering::SeqCst);
        assert_eq!(calls_after_first, 4);

        // Replay of the completed run performs no fetches.
        let summary = orch.resume(&run_id).await.unwrap();
        assert_eq!(summary.succeeded, 4);
        assert_eq!(source.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn resume_mid_aggregation_fetches_only_pending_keys() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let source = Arc::new(CountingFetch::new());
        let orch = orchestrator(
            Arc::clone(&store),
            Arc::clone(&source),
            FixedCatalogue {
                entries: catalogue_entries(),
                fail: false,
            },
        );

        // Simulate a crash after two of four fetches completed.
        let mut state = RunState::new("run-crashed", SyncMode::Full);
        state.catalogue = expand_catalogue(
            &catalogue_entries(),
            &["en".to_string(), "fr".to_string()],
            DOMAIN,
        );
        let date = state.window_date();
        state.tasks = plan_tasks(&state.catalogue, store.as_ref(), &SyncMode::Full, &date)
            .await
            .unwrap();
        state.phase = RunPhase::Aggregating;
        for task in &state.tasks[..2] {
            state.completed_keys.insert(task.destination_key.clone());
        }
        CheckpointStore::new(Arc::clone(&store))
            .save(&mut state)
            .await
            .unwrap();

        let summary = orch.resume("run-crashed").await.unwrap();
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.succeeded, 4);
        // Only the two pending tasks were fetched on resume.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resume_unknown_run_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let source = Arc::new(CountingFetch::new());
        let orch = orchestrator(
            Arc::clone(&store),
            source,
            FixedCatalogue {
                entries: Vec::new(),
                fail: false,
            },
        );

        assert!(orch.resume("run-nope").await.is_err());
    }
}
