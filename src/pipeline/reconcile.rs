// src/pipeline/reconcile.rs

//! Incremental index reconciler.
//!
//! Brings the mutable "latest" snapshot into agreement with a batch of
//! newly fetched documents: every content id in the batch ends up with
//! exactly one live entry, and no stale entry for those ids remains.
//! Deletion fully completes before any insertion; the storage engine under
//! the index only guarantees read consistency between the two passes, and
//! interleaving them can expose a transient duplicate.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{NormalizedDocument, SnapshotManifest};
use crate::pipeline::normalize::Normalizer;
use crate::services::index::DocumentIndex;
use crate::storage::{ObjectStore, get_json, paths, put_json};

const MANIFEST_NAME: &str = "manifest.json";

/// Counts reported by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub batch_size: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub inserted: usize,
    /// Dated snapshot prefix written by this cycle, if any
    pub snapshot_prefix: Option<String>,
}

/// Reconciles one sync window into the "latest" snapshot.
///
/// Exactly one reconciliation may run per cycle; a lock marker under the
/// "latest" prefix makes an overlapping invocation fail fast instead of
/// racing.
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    normalizer: Arc<dyn Normalizer>,
    index: Box<dyn DocumentIndex>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        normalizer: Arc<dyn Normalizer>,
        index: Box<dyn DocumentIndex>,
    ) -> Self {
        Self {
            store,
            normalizer,
            index,
        }
    }

    /// Normalize every raw payload of the window and reconcile the batch.
    pub async fn reconcile_window(&mut self, date: &str) -> Result<ReconcileOutcome> {
        let keys = self.store.list_keys(&paths::window_prefix(date)).await?;

        let mut batch = Vec::new();
        let mut skipped = 0;
        for key in keys {
            // The window prefix also holds the catalogue capture file.
            if paths::parse_raw_payload_key(&key).is_none() {
                continue;
            }
            let Some(payload) = self.store.get_bytes(&key).await? else {
                continue;
            };
            match self.normalizer.normalize(&key, &payload) {
                Ok(doc) => batch.push(doc),
                Err(AppError::MalformedContent { key, message }) => {
                    warn!(key = %key, reason = %message, "Skipping malformed item");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let mut outcome = self.reconcile_batch(batch, date).await?;
        outcome.skipped += skipped;
        Ok(outcome)
    }

    /// Reconcile a batch of normalized documents into "latest".
    ///
    /// An empty batch is a no-op that still succeeds and leaves snapshot
    /// state untouched.
    pub async fn reconcile_batch(
        &mut self,
        batch: Vec<NormalizedDocument>,
        date: &str,
    ) -> Result<ReconcileOutcome> {
        if batch.is_empty() {
            info!("Empty reconcile batch; snapshot unchanged");
            return Ok(ReconcileOutcome::default());
        }

        self.acquire_lock(date).await?;
        let result = self.apply(&batch, date).await;
        let unlock = self.store.delete(paths::RECONCILE_LOCK_KEY).await;

        let outcome = result?;
        unlock?;
        Ok(outcome)
    }

    async fn acquire_lock(&self, date: &str) -> Result<()> {
        if self.store.exists(paths::RECONCILE_LOCK_KEY).await? {
            return Err(AppError::ReconcileBusy(format!(
                "lock marker {} exists",
                paths::RECONCILE_LOCK_KEY
            )));
        }
        let stamp = format!("{date} {}", Utc::now().to_rfc3339());
        self.store
            .put_bytes(paths::RECONCILE_LOCK_KEY, stamp.as_bytes())
            .await
    }

    async fn apply(&mut self, batch: &[NormalizedDocument], date: &str) -> Result<ReconcileOutcome> {
        let mut manifest = self.load_latest().await?;

        // Delete pass: every existing entry for an incoming id goes first.
        let ids: BTreeSet<String> = batch.iter().map(|d| d.content_id.clone()).collect();
        let id_list: Vec<String> = ids.into_iter().collect();
        self.index.delete_by_ids(&id_list).await?;
        let deleted = manifest.remove_ids(id_list.iter());

        // Insert pass.
        self.index.insert(batch).await?;
        let now = Utc::now();
        for doc in batch {
            manifest.register(doc, now);
        }

        // Fresh dated artifact set first, then overwrite "latest" in place.
        let snapshot_prefix = paths::snapshot_prefix(date);
        self.persist(&manifest, &snapshot_prefix).await?;
        self.persist(&manifest, paths::LATEST_PREFIX).await?;

        info!(
            batch = batch.len(),
            deleted,
            live = manifest.count,
            snapshot = %snapshot_prefix,
            "Reconciliation complete"
        );

        Ok(ReconcileOutcome {
            batch_size: batch.len(),
            skipped: 0,
            deleted,
            inserted: batch.len(),
            snapshot_prefix: Some(snapshot_prefix),
        })
    }

    /// Load "latest" into the index, or start empty if absent.
    async fn load_latest(&mut self) -> Result<SnapshotManifest> {
        let manifest: SnapshotManifest =
            get_json(self.store.as_ref(), &latest_key(MANIFEST_NAME))
                .await?
                .unwrap_or_default();

        let mut artifacts = Vec::new();
        let prefix = format!("{}/", paths::LATEST_PREFIX);
        for key in self.store.list_keys(&prefix).await? {
            let name = key.trim_start_matches(&prefix).to_string();
            if name == MANIFEST_NAME || key == paths::RECONCILE_LOCK_KEY {
                continue;
            }
            if let Some(bytes) = self.store.get_bytes(&key).await? {
                artifacts.push((name, bytes));
            }
        }
        self.index.load_artifacts(&artifacts)?;

        Ok(manifest)
    }

    /// Write the manifest and index artifacts under `prefix`.
    async fn persist(&self, manifest: &SnapshotManifest, prefix: &str) -> Result<()> {
        for (name, bytes) in self.index.export_artifacts()? {
            self.store
                .put_bytes(&format!("{prefix}/{name}"), &bytes)
                .await?;
        }
        put_json(
            self.store.as_ref(),
            &format!("{prefix}/{MANIFEST_NAME}"),
            manifest,
        )
        .await
    }
}

fn latest_key(name: &str) -> String {
    format!("{}/{name}", paths::LATEST_PREFIX)
}
