// src/pipeline/publish.rs

//! Snapshot publication and serving refresh.
//!
//! Publication copies the "latest" artifact set into the bucket the serving
//! process reads at startup. The refresh controller then bounces the serving
//! instances so they reload it: stop, poll the stop operation to a terminal
//! state, and only issue the start once the stop has been observed to
//! succeed. A failed or unconfirmed stop leaves the instances serving the
//! previous snapshot rather than risking a half-restarted cluster.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::services::control_plane::{ControlPlane, OperationHandle, OperationStatus};
use crate::storage::{ObjectStore, paths};

/// Copies the "latest" snapshot into the serving bucket.
pub struct SnapshotPublisher {
    source: Arc<dyn ObjectStore>,
    target: Arc<dyn ObjectStore>,
    target_prefix: String,
}

impl SnapshotPublisher {
    pub fn new(
        source: Arc<dyn ObjectStore>,
        target: Arc<dyn ObjectStore>,
        target_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            target_prefix: target_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Copy every artifact under the "latest" prefix to the serving target.
    ///
    /// Returns the number of objects published.
    pub async fn publish_latest(&self) -> Result<usize> {
        let prefix = format!("{}/", paths::LATEST_PREFIX);
        let keys = self
            .source
            .list_keys(&prefix)
            .await
            .map_err(|e| AppError::publish(format!("listing latest snapshot: {e}")))?;

        let mut published = 0;
        for key in keys {
            if key == paths::RECONCILE_LOCK_KEY {
                continue;
            }
            let Some(bytes) = self
                .source
                .get_bytes(&key)
                .await
                .map_err(|e| AppError::publish(format!("reading {key}: {e}")))?
            else {
                continue;
            };
            let name = key.trim_start_matches(&prefix);
            let target_key = format!("{}/{name}", self.target_prefix);
            self.target
                .put_bytes(&target_key, &bytes)
                .await
                .map_err(|e| AppError::publish(format!("writing {target_key}: {e}")))?;
            published += 1;
        }

        if published == 0 {
            return Err(AppError::publish("no snapshot artifacts under latest"));
        }

        info!(published, target = %self.target_prefix, "Snapshot published");
        Ok(published)
    }
}

/// Restarts the serving instances against the freshly published snapshot.
pub struct RefreshController {
    plane: Arc<dyn ControlPlane>,
    poll_interval: Duration,
    max_polls: u32,
}

impl RefreshController {
    pub fn new(plane: Arc<dyn ControlPlane>, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            plane,
            poll_interval,
            max_polls,
        }
    }

    /// Stop the serving instances, confirm the stop, then start them again.
    ///
    /// The start request is never issued unless the stop operation reached
    /// `Succeeded` within the poll budget.
    pub async fn refresh(&self) -> Result<()> {
        let stop = self.plane.stop().await?;
        match self.await_terminal(&stop).await? {
            OperationStatus::Succeeded => {}
            status => {
                warn!(?status, "Stop did not succeed; instances left running");
                return Err(AppError::publish(format!(
                    "stop operation finished as {status:?}; start not attempted"
                )));
            }
        }
        info!("Serving instances stopped");

        let start = self.plane.start().await?;
        match self.await_terminal(&start).await? {
            OperationStatus::Succeeded => {
                info!("Serving instances restarted");
                Ok(())
            }
            status => Err(AppError::publish(format!(
                "start operation finished as {status:?}"
            ))),
        }
    }

    /// Poll an operation until it is terminal, bounded by the poll budget.
    async fn await_terminal(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        for _ in 0..self.max_polls {
            let status = self.plane.status(handle).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(AppError::publish(format!(
            "operation at {} still in progress after {} polls",
            handle.status_url, self.max_polls
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::storage::LocalStore;

    #[tokio::test]
    async fn publishes_latest_artifacts_without_the_lock_marker() {
        let src_tmp = TempDir::new().unwrap();
        let dst_tmp = TempDir::new().unwrap();
        let source: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(src_tmp.path()));
        let target: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dst_tmp.path()));

        source
            .put_bytes("indices/latest/manifest.json", b"{}")
            .await
            .unwrap();
        source
            .put_bytes("indices/latest/documents.json", b"{}")
            .await
            .unwrap();
        source
            .put_bytes(paths::RECONCILE_LOCK_KEY, b"held")
            .await
            .unwrap();

        let publisher =
            SnapshotPublisher::new(Arc::clone(&source), Arc::clone(&target), "serving/latest");
        let published = publisher.publish_latest().await.unwrap();

        assert_eq!(published, 2);
        assert!(target.exists("serving/latest/manifest.json").await.unwrap());
        assert!(
            target
                .exists("serving/latest/documents.json")
                .await
                .unwrap()
        );
        assert!(
            !target
                .exists("serving/latest/.reconcile-lock")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn empty_latest_is_a_publish_error() {
        let src_tmp = TempDir::new().unwrap();
        let dst_tmp = TempDir::new().unwrap();
        let source: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(src_tmp.path()));
        let target: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dst_tmp.path()));

        let publisher = SnapshotPublisher::new(source, target, "serving/latest");
        let err = publisher.publish_latest().await.unwrap_err();
        assert!(matches!(err, AppError::Publish(_)));
    }

    /// Control plane fake with a scripted status sequence per operation.
    struct ScriptedPlane {
        stop_statuses: Mutex<Vec<OperationStatus>>,
        start_statuses: Mutex<Vec<OperationStatus>>,
        start_called: AtomicBool,
    }

    impl ScriptedPlane {
        fn new(stop: Vec<OperationStatus>, start: Vec<OperationStatus>) -> Self {
            Self {
                stop_statuses: Mutex::new(stop),
                start_statuses: Mutex::new(start),
                start_called: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ControlPlane for ScriptedPlane {
        async fn stop(&self) -> crate::error::Result<OperationHandle> {
            Ok(OperationHandle {
                status_url: "stop".to_string(),
            })
        }

        async fn start(&self) -> crate::error::Result<OperationHandle> {
            self.start_called.store(true, Ordering::SeqCst);
            Ok(OperationHandle {
                status_url: "start".to_string(),
            })
        }

        async fn status(&self, handle: &OperationHandle) -> crate::error::Result<OperationStatus> {
            let queue = if handle.status_url == "stop" {
                &self.stop_statuses
            } else {
                &self.start_statuses
            };
            let mut queue = queue.lock().unwrap();
            Ok(if queue.is_empty() {
                OperationStatus::InProgress
            } else {
                queue.remove(0)
            })
        }
    }

    fn controller(plane: Arc<ScriptedPlane>, max_polls: u32) -> RefreshController {
        RefreshController::new(plane, Duration::from_millis(1), max_polls)
    }

    #[tokio::test]
    async fn refresh_stops_then_starts() {
        let plane = Arc::new(ScriptedPlane::new(
            vec![OperationStatus::InProgress, OperationStatus::Succeeded],
            vec![OperationStatus::Succeeded],
        ));
        controller(Arc::clone(&plane), 10).refresh().await.unwrap();
        assert!(plane.start_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_stop_never_issues_the_start() {
        let plane = Arc::new(ScriptedPlane::new(vec![OperationStatus::Failed], Vec::new()));
        let err = controller(Arc::clone(&plane), 10).refresh().await.unwrap_err();

        assert!(matches!(err, AppError::Publish(_)));
        assert!(!plane.start_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_poll_budget_is_bounded() {
        // Never reaches a terminal state; the controller must give up.
        let plane = Arc::new(ScriptedPlane::new(Vec::new(), Vec::new()));
        let err = controller(Arc::clone(&plane), 3).refresh().await.unwrap_err();

        assert!(matches!(err, AppError::Publish(_)));
        assert!(!plane.start_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_start_is_reported() {
        let plane = Arc::new(ScriptedPlane::new(
            vec![OperationStatus::Succeeded],
            vec![OperationStatus::Failed],
        ));
        let err = controller(plane, 10).refresh().await.unwrap_err();
        assert!(matches!(err, AppError::Publish(_)));
    }
}
