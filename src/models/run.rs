// src/models/run.rs

//! Durable workflow run state.
//!
//! A run's checkpoint document records the outcome of every completed step
//! so that replay after a restart skips already-completed work instead of
//! re-executing it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ContentItem, FetchTask, SyncMode};

/// Workflow phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    ListingIds,
    Diffing,
    FetchingFanOut,
    Aggregating,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }
}

/// Attempted/succeeded/failed counts returned by a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Checkpointed state of one sync run, persisted after every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub mode: SyncMode,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Catalogue expansion recorded by the ListingIds step
    #[serde(default)]
    pub catalogue: Vec<ContentItem>,

    /// Fetch-task set recorded by the Diffing step
    #[serde(default)]
    pub tasks: Vec<FetchTask>,

    /// Destination keys whose fetch completed successfully
    #[serde(default)]
    pub completed_keys: BTreeSet<String>,

    /// Destination key -> last error for exhausted fetches
    #[serde(default)]
    pub failed_keys: BTreeMap<String, String>,

    /// Final counts, set when the run reaches Completed
    pub summary: Option<RunSummary>,

    /// Failure detail, set when the run reaches Failed
    pub error: Option<String>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, mode: SyncMode) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            mode,
            phase: RunPhase::ListingIds,
            started_at: now,
            updated_at: now,
            catalogue: Vec::new(),
            tasks: Vec::new(),
            completed_keys: BTreeSet::new(),
            failed_keys: BTreeMap::new(),
            summary: None,
            error: None,
        }
    }

    /// Date stamp used for this run's key prefixes.
    pub fn window_date(&self) -> String {
        self.started_at.format("%Y-%m-%d").to_string()
    }

    /// Tasks whose destination key has not yet been fetched successfully.
    pub fn pending_tasks(&self) -> Vec<FetchTask> {
        self.tasks
            .iter()
            .filter(|t| !self.completed_keys.contains(&t.destination_key))
            .cloned()
            .collect()
    }

    /// Mark the run failed with the given detail.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.phase = RunPhase::Failed;
        self.error = Some(error.into());
    }

    /// Counts over the recorded task set.
    pub fn current_summary(&self) -> RunSummary {
        RunSummary {
            attempted: self.tasks.len(),
            succeeded: self.completed_keys.len(),
            failed: self.failed_keys.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(key: &str) -> FetchTask {
        FetchTask {
            content_id: "336".to_string(),
            locale: "en".to_string(),
            source_url: "https://example.ca/en/rest/page-by-id/336".to_string(),
            destination_key: key.to_string(),
        }
    }

    #[test]
    fn pending_tasks_skip_completed_keys() {
        let mut state = RunState::new("run-1", SyncMode::Full);
        state.tasks = vec![task("a"), task("b"), task("c")];
        state.completed_keys.insert("b".to_string());

        let pending = state.pending_tasks();
        let keys: Vec<_> = pending.iter().map(|t| t.destination_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn summary_counts_tasks_and_failures() {
        let mut state = RunState::new("run-1", SyncMode::Full);
        state.tasks = vec![task("a"), task("b")];
        state.completed_keys.insert("a".to_string());
        state.failed_keys.insert("b".to_string(), "boom".to_string());

        let summary = state.current_summary();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn run_state_survives_serialization() {
        let mut state = RunState::new("run-1", SyncMode::Full);
        state.tasks = vec![task("a")];
        state.completed_keys.insert("a".to_string());

        let json = serde_json::to_string(&state).unwrap();
        let back: RunState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, "run-1");
        assert_eq!(back.phase, RunPhase::ListingIds);
        assert!(back.completed_keys.contains("a"));
    }
}
