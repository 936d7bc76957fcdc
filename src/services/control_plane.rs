// src/services/control_plane.rs

//! Serving-cluster control plane client.
//!
//! Stop/start calls return an operation handle whose status URL (taken from
//! a response header) is polled until the operation reports a terminal
//! state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ControlPlaneConfig;
use crate::error::{AppError, Result};
use crate::services::identity::CachedTokenProvider;

/// Terminal and in-flight operation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }
}

/// Handle to an asynchronous control-plane operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    pub status_url: String,
}

/// Cluster-management control plane collaborator.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Request a stop of the serving instances.
    async fn stop(&self) -> Result<OperationHandle>;

    /// Request a start of the serving instances.
    async fn start(&self) -> Result<OperationHandle>;

    /// Poll the status of an operation.
    async fn status(&self, handle: &OperationHandle) -> Result<OperationStatus>;
}

#[derive(Debug, Deserialize)]
struct OperationStatusBody {
    status: String,
}

/// HTTP implementation against the cluster-management API.
pub struct HttpControlPlane {
    http: reqwest::Client,
    config: ControlPlaneConfig,
    tokens: Arc<CachedTokenProvider>,
}

impl HttpControlPlane {
    pub fn new(config: ControlPlaneConfig, tokens: Arc<CachedTokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    async fn post_operation(&self, url: &str) -> Result<OperationHandle> {
        if url.is_empty() {
            return Err(AppError::control_plane(
                "control plane endpoint not configured",
            ));
        }

        let token = self.tokens.token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::control_plane(format!("{url}: {e}")))?;

        let status_url = response
            .headers()
            .get(self.config.operation_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::control_plane(format!(
                    "response from {url} is missing the {} header",
                    self.config.operation_header
                ))
            })?;

        Ok(OperationHandle { status_url })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn stop(&self) -> Result<OperationHandle> {
        self.post_operation(&self.config.stop_url).await
    }

    async fn start(&self) -> Result<OperationHandle> {
        self.post_operation(&self.config.start_url).await
    }

    async fn status(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let token = self.tokens.token().await?;
        let body: OperationStatusBody = self
            .http
            .get(&handle.status_url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::control_plane(format!("{}: {e}", handle.status_url)))?
            .json()
            .await?;

        Ok(match body.status.as_str() {
            "Succeeded" => OperationStatus::Succeeded,
            "Failed" => OperationStatus::Failed,
            _ => OperationStatus::InProgress,
        })
    }
}
