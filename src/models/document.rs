// src/models/document.rs

//! Normalized documents and snapshot manifest models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document ready for indexing, derived from a raw payload by the
/// normalization collaborator.
///
/// `content_id` is the full content identity including locale
/// (`{nid}-{locale}`), so the one-live-entry-per-id invariant holds per
/// bilingual variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub content_id: String,
    pub locale: String,
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub body_text: String,
    /// Object-store key of the backing raw payload
    pub source_key: String,
    /// sha256 digest of the raw payload, for content-identity diffing
    pub digest: String,
}

/// A document registered in a snapshot, keyed by content id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub content_id: String,
    pub locale: String,
    pub title: String,
    pub url: String,
    pub source_key: String,
    pub digest: String,
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn from_document(doc: &NormalizedDocument, indexed_at: DateTime<Utc>) -> Self {
        Self {
            content_id: doc.content_id.clone(),
            locale: doc.locale.clone(),
            title: doc.title.clone(),
            url: doc.url.clone(),
            source_key: doc.source_key.clone(),
            digest: doc.digest.clone(),
            indexed_at,
        }
    }
}

/// Registry of live index entries, persisted alongside the opaque index
/// artifacts as part of every snapshot bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub updated_at: Option<DateTime<Utc>>,
    pub count: usize,
    /// content_id -> entry; BTreeMap keeps serialized output deterministic
    pub entries: BTreeMap<String, IndexEntry>,
}

impl SnapshotManifest {
    /// Remove every entry whose content id appears in `ids`.
    /// Returns the number of entries removed.
    pub fn remove_ids<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.entries.remove(id).is_some() {
                removed += 1;
            }
        }
        self.count = self.entries.len();
        removed
    }

    /// Register a document, replacing any previous entry for its id.
    pub fn register(&mut self, doc: &NormalizedDocument, now: DateTime<Utc>) {
        self.entries
            .insert(doc.content_id.clone(), IndexEntry::from_document(doc, now));
        self.count = self.entries.len();
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> NormalizedDocument {
        NormalizedDocument {
            content_id: id.to_string(),
            locale: "en".to_string(),
            title: format!("Title {id}"),
            url: format!("https://example.ca/{id}"),
            published_date: "2026-08-01".to_string(),
            body_text: "body".to_string(),
            source_key: format!("preload/2026-08-01/article/en/{id}.json"),
            digest: "abc".to_string(),
        }
    }

    #[test]
    fn register_replaces_previous_entry() {
        let mut manifest = SnapshotManifest::default();
        let now = Utc::now();
        manifest.register(&doc("336"), now);
        let mut updated = doc("336");
        updated.title = "Newer".to_string();
        manifest.register(&updated, now);

        assert_eq!(manifest.count, 1);
        assert_eq!(manifest.entries["336"].title, "Newer");
    }

    #[test]
    fn remove_ids_reports_removed_count() {
        let mut manifest = SnapshotManifest::default();
        let now = Utc::now();
        manifest.register(&doc("336"), now);
        manifest.register(&doc("703"), now);

        let ids = vec!["336".to_string(), "999".to_string()];
        let removed = manifest.remove_ids(ids.iter());
        assert_eq!(removed, 1);
        assert_eq!(manifest.count, 1);
        assert!(manifest.entries.contains_key("703"));
    }
}
