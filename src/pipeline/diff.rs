// src/pipeline/diff.rs

//! Work-item diff engine.
//!
//! Given a catalogue and the existing key namespace, computes the minimal
//! fetch-task set. Full runs skip keys that already exist; delta runs
//! re-fetch every reported item unconditionally, since delta membership
//! already signals a change.

use crate::error::Result;
use crate::models::{CatalogueEntry, ContentItem, FetchTask, SyncMode};
use crate::storage::{ObjectStore, paths};

/// Expand catalogue entries across locales into per-locale content items.
///
/// Ordering follows catalogue insertion order, locales expanded in the
/// configured order for each entry; there is no priority scheme.
pub fn expand_catalogue(
    entries: &[CatalogueEntry],
    locales: &[String],
    domain: &str,
) -> Vec<ContentItem> {
    let domain = domain.trim_end_matches('/');
    let mut items = Vec::with_capacity(entries.len() * locales.len());
    for entry in entries {
        for locale in locales {
            items.push(ContentItem {
                content_id: entry.nid.clone(),
                content_type: entry.content_type.clone(),
                locale: locale.clone(),
                source_url: format!("{}/{}/rest/page-by-id/{}", domain, locale, entry.nid),
            });
        }
    }
    items
}

/// Compute the fetch-task set for `items` against the current store state.
///
/// Deterministic: the same items and store state always yield the same
/// task set in the same order.
pub async fn plan_tasks(
    items: &[ContentItem],
    store: &dyn ObjectStore,
    mode: &SyncMode,
    date: &str,
) -> Result<Vec<FetchTask>> {
    let mut tasks = Vec::new();

    for item in items {
        let destination_key = paths::raw_payload_key(
            date,
            &item.content_type,
            &item.locale,
            &item.content_id,
        );

        if !mode.is_delta() && store.exists(&destination_key).await? {
            continue;
        }

        tasks.push(FetchTask {
            content_id: item.content_id.clone(),
            locale: item.locale.clone(),
            source_url: item.source_url.clone(),
            destination_key,
        });
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::models::DeltaWindow;
    use crate::storage::LocalStore;

    const DOMAIN: &str = "https://plus-test.ssc-spc.gc.ca";

    fn locales() -> Vec<String> {
        vec!["en".to_string(), "fr".to_string()]
    }

    fn catalogue() -> Vec<CatalogueEntry> {
        vec![
            CatalogueEntry {
                nid: "336".to_string(),
                content_type: "article".to_string(),
            },
            CatalogueEntry {
                nid: "534".to_string(),
                content_type: "gigabit".to_string(),
            },
        ]
    }

    #[test]
    fn expansion_preserves_catalogue_order() {
        let items = expand_catalogue(&catalogue(), &locales(), DOMAIN);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].content_id, "336");
        assert_eq!(items[0].locale, "en");
        assert_eq!(items[1].locale, "fr");
        assert_eq!(items[2].content_id, "534");
        assert_eq!(
            items[3].source_url,
            "https://plus-test.ssc-spc.gc.ca/fr/rest/page-by-id/534"
        );
    }

    #[tokio::test]
    async fn empty_store_yields_one_task_per_item_locale_pair() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let items = expand_catalogue(&catalogue(), &locales(), DOMAIN);

        let tasks = plan_tasks(&items, &store, &SyncMode::Full, "2026-08-28")
            .await
            .unwrap();
        assert_eq!(tasks.len(), 4);
        assert_eq!(
            tasks[0].destination_key,
            "preload/2026-08-28/article/en/336.json"
        );
    }

    #[tokio::test]
    async fn full_mode_skips_existing_keys() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put_bytes("preload/2026-08-28/article/en/336.json", b"{}")
            .await
            .unwrap();

        let items = expand_catalogue(&catalogue(), &locales(), DOMAIN);
        let tasks = plan_tasks(&items, &store, &SyncMode::Full, "2026-08-28")
            .await
            .unwrap();

        assert_eq!(tasks.len(), 3);
        assert!(
            tasks
                .iter()
                .all(|t| t.destination_key != "preload/2026-08-28/article/en/336.json")
        );
    }

    #[tokio::test]
    async fn delta_mode_refetches_existing_keys() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put_bytes("preload/2026-08-28/article/en/336.json", b"{}")
            .await
            .unwrap();

        let items = expand_catalogue(&catalogue(), &locales(), DOMAIN);
        let tasks = plan_tasks(
            &items,
            &store,
            &SyncMode::Delta(DeltaWindow::Week),
            "2026-08-28",
        )
        .await
        .unwrap();

        assert_eq!(tasks.len(), 4);
    }

    #[tokio::test]
    async fn planning_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put_bytes("preload/2026-08-28/gigabit/fr/534.json", b"{}")
            .await
            .unwrap();

        let items = expand_catalogue(&catalogue(), &locales(), DOMAIN);
        let first = plan_tasks(&items, &store, &SyncMode::Full, "2026-08-28")
            .await
            .unwrap();
        let second = plan_tasks(&items, &store, &SyncMode::Full, "2026-08-28")
            .await
            .unwrap();

        assert_eq!(first, second);
    }
}
