// src/pipeline/normalize.rs

//! Raw payload normalization.
//!
//! Boilerplate stripping and text cleanup are delegated to an external
//! collaborator behind the `Normalizer` trait; `PageNormalizer` performs
//! the field mapping from the source page shape and computes the payload
//! digest used for content-identity diffing.

use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{NormalizedDocument, PageDocument};
use crate::storage::paths;

/// Collaborator turning a raw payload into an indexable document.
pub trait Normalizer: Send + Sync {
    /// Normalize the payload stored at `key`.
    ///
    /// Returns `MalformedContent` when the id cannot be parsed from the
    /// backing key or the payload does not decode; callers skip such items
    /// with a warning rather than aborting the batch.
    fn normalize(&self, key: &str, payload: &[u8]) -> Result<NormalizedDocument>;
}

/// Default normalizer mapping `PageDocument` fields.
#[derive(Debug, Default, Clone)]
pub struct PageNormalizer;

impl PageNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Normalizer for PageNormalizer {
    fn normalize(&self, key: &str, payload: &[u8]) -> Result<NormalizedDocument> {
        let (_content_type, locale, id) = paths::parse_raw_payload_key(key)
            .ok_or_else(|| AppError::malformed(key, "content id not parsable from key"))?;

        let page: PageDocument = serde_json::from_slice(payload)
            .map_err(|e| AppError::malformed(key, format!("payload does not decode: {e}")))?;

        // An empty body is valid content and still indexed.
        Ok(NormalizedDocument {
            content_id: format!("{id}-{locale}"),
            locale,
            title: page.title,
            url: page.url,
            published_date: page.date,
            body_text: page.body,
            source_key: key.to_string(),
            digest: hex::encode(Sha256::digest(payload)),
        })
    }
}
