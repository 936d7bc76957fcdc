// src/models/content.rs

//! Content catalogue and fetch-task models.

use serde::{Deserialize, Deserializer, Serialize};

/// Recency window for a delta sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaWindow {
    Week,
    Month,
}

impl DeltaWindow {
    /// Path segment used by the `updated-ids` endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaWindow::Week => "week",
            DeltaWindow::Month => "month",
        }
    }
}

/// Kind of sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "window")]
pub enum SyncMode {
    /// Full catalogue; only keys missing from the store are fetched.
    Full,
    /// Reported delta window; every reported item is re-fetched
    /// unconditionally, since delta membership already signals a change.
    Delta(DeltaWindow),
}

impl SyncMode {
    pub fn is_delta(&self) -> bool {
        matches!(self, SyncMode::Delta(_))
    }
}

/// One row of the source catalogue listing (`/rest/all-ids`,
/// `/rest/updated-ids/{window}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    /// Source content id; the API serves it as either string or number
    #[serde(deserialize_with = "string_or_number")]
    pub nid: String,

    /// Content type reported by the source (e.g. "article")
    #[serde(rename = "type")]
    pub content_type: String,
}

/// One piece of content in one locale, immutable per sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub content_id: String,
    pub content_type: String,
    pub locale: String,
    pub source_url: String,
}

/// A unit of outstanding fetch work, one per (item, locale) pair.
///
/// Ephemeral: created by the diff engine, consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTask {
    pub content_id: String,
    pub locale: String,
    pub source_url: String,
    pub destination_key: String,
}

/// Decoded page payload shape from `/rest/page-by-id/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub langcode: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nid: String,
}

/// Accept a JSON string or number and normalize to `String`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_entry_accepts_numeric_nid() {
        let entry: CatalogueEntry = serde_json::from_str(r#"{"nid": 336, "type": "article"}"#)
            .unwrap();
        assert_eq!(entry.nid, "336");
        assert_eq!(entry.content_type, "article");
    }

    #[test]
    fn catalogue_entry_accepts_string_nid() {
        let entry: CatalogueEntry = serde_json::from_str(r#"{"nid": "534", "type": "gigabit"}"#)
            .unwrap();
        assert_eq!(entry.nid, "534");
    }

    #[test]
    fn page_document_tolerates_missing_fields() {
        let page: PageDocument = serde_json::from_str(r#"{"title": "Hello", "nid": "336"}"#)
            .unwrap();
        assert_eq!(page.title, "Hello");
        assert!(page.body.is_empty());
    }

    #[test]
    fn sync_mode_roundtrip() {
        let mode = SyncMode::Delta(DeltaWindow::Week);
        let json = serde_json::to_string(&mode).unwrap();
        let back: SyncMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mode);
        assert!(back.is_delta());
    }
}
