// src/pipeline/mod.rs

//! Sync workflow stages: diffing, checkpointed orchestration,
//! reconciliation, publishing and the weekly composition.

mod checkpoint;
mod diff;
mod normalize;
mod publish;
mod reconcile;
mod sync;
mod weekly;

pub use checkpoint::CheckpointStore;
pub use diff::{expand_catalogue, plan_tasks};
pub use normalize::{Normalizer, PageNormalizer};
pub use publish::{RefreshController, SnapshotPublisher};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use sync::Orchestrator;
pub use weekly::{WeeklyOutcome, WeeklyPipeline};
