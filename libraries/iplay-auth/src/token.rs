//! Token lifecycle management.

use crate::coalesce::RefreshCoalescer;
use crate::credential::{Credential, CredentialStore};
use crate::error::{AuthError, Result};
use crate::oauth::TokenEndpoint;
use crate::redirect::normalize_loopback_url;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refresh this long before the provider's expiry.
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

/// Anything that can hand out a currently valid bearer token.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Owns acquisition, refresh and invalidation of one session's credential.
///
/// The manager itself is cheap; the token endpoint and the refresh
/// coalescer are shared between managers so that per-request managers
/// (one per cookie jar) still coalesce refreshes of the same token.
pub struct TokenManager {
    endpoint: Arc<TokenEndpoint>,
    store: Arc<dyn CredentialStore>,
    coalescer: Arc<RefreshCoalescer>,
    refresh_buffer: Duration,
}

impl TokenManager {
    pub fn new(endpoint: Arc<TokenEndpoint>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            endpoint,
            store,
            coalescer: Arc::new(RefreshCoalescer::default()),
            refresh_buffer: Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS),
        }
    }

    /// Share a refresh coalescer with other managers.
    pub fn with_coalescer(mut self, coalescer: Arc<RefreshCoalescer>) -> Self {
        self.coalescer = coalescer;
        self
    }

    /// Refresh this long before expiry instead of the default five minutes.
    pub fn with_refresh_buffer(mut self, buffer: std::time::Duration) -> Self {
        self.refresh_buffer = Duration::from_std(buffer)
            .unwrap_or_else(|_| Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS));
        self
    }

    pub fn endpoint(&self) -> &TokenEndpoint {
        &self.endpoint
    }

    /// Exchange an authorization code and persist the resulting credential.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential> {
        let redirect_uri = normalize_loopback_url(redirect_uri);
        let grant = self.endpoint.exchange_code(code, &redirect_uri).await?;

        let credential = Credential::from_grant(grant, None, Utc::now());
        self.store.save(&credential).await?;

        info!(
            expires_at = %credential.expires_at,
            has_refresh = credential.refresh_token.is_some(),
            "Session credential stored"
        );
        Ok(credential)
    }

    /// Return an access token that stays valid for at least the refresh
    /// buffer, refreshing first when needed.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let Some(credential) = self.store.load().await? else {
            return Err(AuthError::NotAuthenticated);
        };

        let now = Utc::now();
        if credential.is_fresh(now, self.refresh_buffer) {
            return Ok(credential.access_token);
        }

        match credential.refresh_token.clone() {
            Some(refresh_token) => {
                debug!(expires_at = %credential.expires_at, "Access token inside refresh buffer");
                let refreshed = self.refresh_with(refresh_token).await?;
                Ok(refreshed.access_token)
            }
            // Without a refresh token a not-yet-expired access token is
            // still the best we have.
            None if credential.has_access_token() && !credential.is_expired(now) => {
                Ok(credential.access_token)
            }
            None => Err(AuthError::NotAuthenticated),
        }
    }

    /// Refresh unconditionally.
    pub async fn refresh(&self) -> Result<Credential> {
        let refresh_token = self
            .store
            .load()
            .await?
            .and_then(|c| c.refresh_token)
            .ok_or(AuthError::NotAuthenticated)?;

        self.refresh_with(refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: String) -> Result<Credential> {
        let endpoint = Arc::clone(&self.endpoint);
        let spent = refresh_token.clone();
        let outcome = self
            .coalescer
            .run(&refresh_token, || async move {
                let grant = endpoint.refresh(&spent).await?;
                Ok(Credential::from_grant(grant, Some(spent), Utc::now()))
            })
            .await;

        match outcome {
            Ok(credential) => {
                self.store.save(&credential).await?;
                Ok(credential)
            }
            Err(err @ AuthError::RateLimited { .. }) => Err(err),
            Err(err) if err.is_rejection() => {
                warn!(error = %err, "Refresh token rejected, clearing session");
                self.store.clear().await?;
                Err(AuthError::Expired(err.to_string()))
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed");
                Err(AuthError::Expired(err.to_string()))
            }
        }
    }

    /// Read-only view of the stored credential.
    pub async fn current_credential(&self) -> Result<Option<Credential>> {
        self.store.load().await
    }

    /// Drop every stored token. Safe to call repeatedly.
    pub async fn invalidate(&self) -> Result<()> {
        debug!("Invalidating session credential");
        self.store.clear().await
    }
}

#[async_trait]
impl AccessTokenProvider for TokenManager {
    async fn access_token(&self) -> Result<String> {
        self.get_valid_access_token().await
    }
}
