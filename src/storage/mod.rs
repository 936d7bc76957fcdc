// src/storage/mod.rs

//! Object storage abstractions for raw payloads, run state and snapshots.
//!
//! ## Key Layout
//!
//! ```text
//! preload/{date}/{type}/{locale}/{id}.json   # raw payloads (append-only)
//! preload/{date}/ids-{date}.json             # catalogue capture
//! runs/{run_id}/state.json                   # durable run checkpoints
//! indices/{date}/*                           # dated snapshots (immutable)
//! indices/latest/*                           # mutable, reconciler-only
//! ```

pub mod local;
pub mod s3;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStore;
pub use s3::S3Store;

/// Trait for object storage backends.
///
/// Writes are idempotent: putting the same key twice overwrites, never
/// duplicates.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write bytes at `key`, overwriting any existing object.
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the object at `key`, or `None` if absent.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List all keys under `prefix`, in lexicographic order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Serialize `value` as JSON and write it at `key`.
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.put_bytes(key, &bytes).await
}

/// Read and deserialize the JSON object at `key`, or `None` if absent.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get_bytes(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Key construction and parsing for the store layout.
pub mod paths {
    /// Prefix of the mutable "latest" snapshot.
    pub const LATEST_PREFIX: &str = "indices/latest";

    /// Lock marker guarding "latest" against overlapping reconciliations.
    pub const RECONCILE_LOCK_KEY: &str = "indices/latest/.reconcile-lock";

    /// Key for one raw payload.
    pub fn raw_payload_key(date: &str, content_type: &str, locale: &str, id: &str) -> String {
        format!("preload/{date}/{content_type}/{locale}/{id}.json")
    }

    /// Key capturing the raw catalogue listing for a run.
    pub fn catalogue_capture_key(date: &str) -> String {
        format!("preload/{date}/ids-{date}.json")
    }

    /// Prefix of all raw payloads for one sync window.
    pub fn window_prefix(date: &str) -> String {
        format!("preload/{date}/")
    }

    /// Key for a run's checkpoint document.
    pub fn run_state_key(run_id: &str) -> String {
        format!("runs/{run_id}/state.json")
    }

    /// Prefix of a dated, immutable snapshot bundle.
    pub fn snapshot_prefix(date: &str) -> String {
        format!("indices/{date}")
    }

    /// Parse `(content_type, locale, id)` out of a raw payload key.
    /// Returns `None` for keys that do not match the payload layout
    /// (e.g. the catalogue capture file).
    pub fn parse_raw_payload_key(key: &str) -> Option<(String, String, String)> {
        let parts: Vec<&str> = key.split('/').collect();
        match parts.as_slice() {
            ["preload", _date, content_type, locale, file] => {
                let id = file.strip_suffix(".json")?;
                if id.is_empty() {
                    return None;
                }
                Some((content_type.to_string(), locale.to_string(), id.to_string()))
            }
            _ => None,
        }
    }

}
