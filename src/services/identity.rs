// src/services/identity.rs

//! Bearer-token acquisition.
//!
//! Credential acquisition itself is an external collaborator behind the
//! `TokenSource` trait; this module only adds expiry-aware caching so the
//! source API and control plane share one construct-once provider.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, Result};

/// A bearer token with its expiry.
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// Whether the token is expired or about to expire.
    /// A 60s skew window avoids presenting a token that dies in flight.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(60) >= self.expires_at
    }
}

/// Opaque credential collaborator.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire(&self) -> Result<BearerToken>;
}

/// Token source reading a long-lived token from an environment variable.
pub struct EnvTokenSource {
    var: String,
}

impl EnvTokenSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn acquire(&self) -> Result<BearerToken> {
        let secret = std::env::var(&self.var)
            .map_err(|_| AppError::Identity(format!("environment variable {} not set", self.var)))?;
        Ok(BearerToken {
            secret,
            expires_at: Utc::now() + Duration::hours(24),
        })
    }
}

/// Expiry-aware caching wrapper over a `TokenSource`.
pub struct CachedTokenProvider {
    source: Box<dyn TokenSource>,
    cached: Mutex<Option<BearerToken>>,
}

impl CachedTokenProvider {
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid token secret, refreshing through the source when the
    /// cached token is missing or near expiry.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let needs_refresh = match cached.as_ref() {
            Some(token) => token.needs_refresh(),
            None => true,
        };
        if needs_refresh {
            debug!("Acquiring fresh bearer token");
            *cached = Some(self.source.acquire().await?);
        }
        Ok(cached.as_ref().map(|t| t.secret.clone()).unwrap_or_default())
    }
}
