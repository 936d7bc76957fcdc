// src/services/mod.rs

//! External collaborators: source API, identity provider, control plane,
//! retry-wrapped fetcher and document index.

pub mod catalogue;
pub mod control_plane;
pub mod fetcher;
pub mod identity;
pub mod index;

pub use catalogue::{CatalogueSource, PageFetch, SourceClient};
pub use control_plane::{ControlPlane, HttpControlPlane, OperationHandle, OperationStatus};
pub use fetcher::{Fetcher, RetryPolicy};
pub use identity::{BearerToken, CachedTokenProvider, EnvTokenSource, TokenSource};
pub use index::{DocumentIndex, EmbeddingSettings, JsonDocumentIndex};
