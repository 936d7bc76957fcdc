// src/services/catalogue.rs

//! Content source API client.
//!
//! Speaks the paginated bilingual REST surface of the source system:
//!
//! - `GET {domain}/{locale}/rest/all-ids` -> full catalogue
//! - `GET {domain}/{locale}/rest/updated-ids/{week|month}` -> delta catalogue
//! - `GET {domain}/{locale}/rest/page-by-id/{id}` -> one page payload

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::{AppError, Result};
use crate::models::{CatalogueEntry, SyncMode};
use crate::services::identity::CachedTokenProvider;

/// Catalogue listing collaborator, mockable for orchestrator tests.
#[async_trait]
pub trait CatalogueSource: Send + Sync {
    /// List the catalogue for `locale` under the given sync mode.
    async fn list(&self, locale: &str, mode: &SyncMode) -> Result<Vec<CatalogueEntry>>;
}

/// Single-page fetch collaborator, mockable for fetcher tests.
///
/// Returns the raw JSON body bytes of a successful, decodable response.
#[async_trait]
pub trait PageFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP client against the content source API.
pub struct SourceClient {
    http: reqwest::Client,
    domain: String,
    tokens: Arc<CachedTokenProvider>,
}

impl SourceClient {
    /// Build a client from configuration.
    ///
    /// TLS certificate validation is disabled when the config says so; the
    /// source sits behind an internal proxy presenting a non-public chain.
    pub fn new(config: &SourceConfig, tokens: Arc<CachedTokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            domain: config.domain.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// URL of the page-by-id endpoint for one (locale, id).
    pub fn page_url(&self, locale: &str, id: &str) -> String {
        format!("{}/{}/rest/page-by-id/{}", self.domain, locale, id)
    }

    async fn get_body(&self, url: &str) -> Result<Vec<u8>> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::transient(url, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| AppError::transient(url, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::transient(url, e))?;

        // Decode check: a truncated or proxied-error body must count as a
        // failed attempt, not be persisted as a payload.
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .map_err(|e| AppError::transient(url, format!("response is not valid JSON: {e}")))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl CatalogueSource for SourceClient {
    async fn list(&self, locale: &str, mode: &SyncMode) -> Result<Vec<CatalogueEntry>> {
        let url = match mode {
            SyncMode::Full => format!("{}/{}/rest/all-ids", self.domain, locale),
            SyncMode::Delta(window) => format!(
                "{}/{}/rest/updated-ids/{}",
                self.domain,
                locale,
                window.as_str()
            ),
        };

        let body = self.get_body(&url).await.map_err(|e| {
            AppError::orchestration(format!("catalogue listing failed: {e}"))
        })?;
        let entries: Vec<CatalogueEntry> = serde_json::from_slice(&body).map_err(|e| {
            AppError::orchestration(format!("catalogue listing unparsable from {url}: {e}"))
        })?;
        Ok(entries)
    }
}

#[async_trait]
impl PageFetch for SourceClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.get_body(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::EnvTokenSource;

    fn client() -> SourceClient {
        let tokens = Arc::new(CachedTokenProvider::new(Box::new(EnvTokenSource::new(
            "PLUS_SYNC_TOKEN",
        ))));
        let config = SourceConfig {
            domain: "https://plus-test.ssc-spc.gc.ca/".to_string(),
            ..SourceConfig::default()
        };
        SourceClient::new(&config, tokens).unwrap()
    }

    #[test]
    fn page_url_shape() {
        let client = client();
        assert_eq!(
            client.page_url("en", "336"),
            "https://plus-test.ssc-spc.gc.ca/en/rest/page-by-id/336"
        );
        assert_eq!(
            client.page_url("fr", "534"),
            "https://plus-test.ssc-spc.gc.ca/fr/rest/page-by-id/534"
        );
    }
}
