// src/pipeline/checkpoint.rs

//! Durable run checkpoints.
//!
//! Every workflow transition is written through here before the
//! orchestrator advances, so a restarted process can reload the run and
//! skip completed steps.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::models::RunState;
use crate::storage::{ObjectStore, get_json, paths, put_json};

/// Persists run state under `runs/{run_id}/state.json`.
#[derive(Clone)]
pub struct CheckpointStore {
    store: Arc<dyn ObjectStore>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Load the checkpoint for a run, if one exists.
    pub async fn load(&self, run_id: &str) -> Result<Option<RunState>> {
        get_json(self.store.as_ref(), &paths::run_state_key(run_id)).await
    }

    /// Durably record the current run state.
    pub async fn save(&self, state: &mut RunState) -> Result<()> {
        state.updated_at = Utc::now();
        put_json(
            self.store.as_ref(),
            &paths::run_state_key(&state.run_id),
            state,
        )
        .await?;
        debug!(run_id = %state.run_id, phase = ?state.phase, "Checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::models::{RunPhase, SyncMode};
    use crate::storage::LocalStore;

    #[tokio::test]
    async fn save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let checkpoints = CheckpointStore::new(store);

        let mut state = RunState::new("run-1", SyncMode::Full);
        state.phase = RunPhase::Diffing;
        checkpoints.save(&mut state).await.unwrap();

        let loaded = checkpoints.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.phase, RunPhase::Diffing);
    }

    #[tokio::test]
    async fn unknown_run_is_none() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let checkpoints = CheckpointStore::new(store);

        assert!(checkpoints.load("missing").await.unwrap().is_none());
    }
}
