// src/services/fetcher.rs

//! Retry-wrapped fetcher: one network fetch plus one durable write.
//!
//! Retries use a fixed inter-attempt delay, no backoff; the transient
//! failures seen on this path are short proxy connection resets, and a
//! fixed 3s wait clears them. The write happens only after a successful
//! fetch and decode, so an exhausted budget never clobbers a previously
//! stored payload.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::FetchTask;
use crate::services::catalogue::PageFetch;
use crate::storage::ObjectStore;

/// Fixed attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Budget for the scheduled weekly refresh.
    pub fn scheduled() -> Self {
        Self::new(5, Duration::from_secs(3))
    }

    /// Budget for ad-hoc runs.
    pub fn adhoc() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

/// Fetches one page and persists it at the task's destination key.
pub struct Fetcher {
    source: Arc<dyn PageFetch>,
    store: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(source: Arc<dyn PageFetch>, store: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self {
            source,
            store,
            policy,
        }
    }

    /// Fetch the task's source URL and write the payload at its destination
    /// key, overwriting any prior object (idempotent).
    ///
    /// Returns the decoded payload bytes, or `PermanentFetch` once the
    /// attempt budget is exhausted. Budget exhaustion is a per-item failure;
    /// callers record it and move on.
    pub async fn fetch_and_store(&self, task: &FetchTask) -> Result<Vec<u8>> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.attempts {
            match self.source.fetch(&task.source_url).await {
                Ok(bytes) => {
                    self.store.put_bytes(&task.destination_key, &bytes).await?;
                    debug!(
                        content_id = %task.content_id,
                        locale = %task.locale,
                        key = %task.destination_key,
                        attempt,
                        "Stored payload"
                    );
                    return Ok(bytes);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        url = %task.source_url,
                        attempt,
                        budget = self.policy.attempts,
                        error = %last_error,
                        "Fetch attempt failed"
                    );
                    if attempt < self.policy.attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        Err(AppError::PermanentFetch {
            url: task.source_url.clone(),
            attempts: self.policy.attempts,
            last_error,
        })
    }
}
