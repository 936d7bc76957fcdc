// src/models/mod.rs

//! Domain models for the sync engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod content;
mod document;
mod run;

// Re-export all public types
pub use content::{CatalogueEntry, ContentItem, DeltaWindow, FetchTask, PageDocument, SyncMode};
pub use document::{IndexEntry, NormalizedDocument, SnapshotManifest};
pub use run::{RunPhase, RunState, RunSummary};
