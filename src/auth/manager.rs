use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::clock::{Clock, SystemClock};
use super::provider::TokenProvider;
use super::types::BearerToken;
use crate::error::{FileMuncherError, Result};

/// Token manager
/// Caches the backend token and refreshes it through the provider once expired
pub struct TokenManager {
    /// Source of fresh tokens
    provider: Arc<dyn TokenProvider>,

    /// Time source for expiry checks
    clock: Arc<dyn Clock>,

    /// Current token, absent until the first request
    cached: RwLock<Option<BearerToken>>,

    /// Held for the whole refresh so only one token request is in flight
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Create a manager backed by the system clock
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_clock(provider, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit clock
    pub fn with_clock(provider: Arc<dyn TokenProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return the cached token while it is valid
    async fn cached_token(&self) -> Option<BearerToken> {
        let cached = self.cached.read().await;
        let now = self.clock.now();
        cached
            .as_ref()
            .filter(|token| !token.is_expired_at(now))
            .cloned()
    }

    /// Get a valid backend token, fetching a new one if needed.
    ///
    /// Concurrent callers that miss the cache wait for a single refresh
    /// instead of each hitting the token endpoint.
    pub async fn get_backend_token(&self) -> Result<BearerToken> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        tracing::debug!("Backend token missing or expired, refreshing");
        let token = self.refresh().await?;

        *self.cached.write().await = Some(token.clone());
        Ok(token)
    }

    /// True if a non-expired token is cached
    pub async fn has_valid_token(&self) -> bool {
        self.cached_token().await.is_some()
    }

    async fn refresh(&self) -> Result<BearerToken> {
        let grant = self.provider.fetch_token().await.map_err(|e| match e {
            FileMuncherError::Authentication(msg) => FileMuncherError::Authentication(msg),
            other => FileMuncherError::Authentication(other.to_string()),
        })?;

        if grant.expires_in <= chrono::Duration::zero() {
            return Err(FileMuncherError::Authentication(format!(
                "token endpoint returned non-positive lifetime ({}s)",
                grant.expires_in.num_seconds()
            )));
        }

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(grant.expires_in)
            .ok_or_else(|| {
                FileMuncherError::Authentication(format!(
                    "token lifetime too large ({}s)",
                    grant.expires_in.num_seconds()
                ))
            })?;
        tracing::info!(
            "Backend token refreshed, expires: {}",
            expires_at.to_rfc3339()
        );

        Ok(BearerToken::new(grant.access_token, expires_at))
    }
}
