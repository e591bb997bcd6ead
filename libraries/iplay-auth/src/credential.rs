//! OAuth credentials and the stores that hold them.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Access/refresh token pair held on the server side of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived bearer token (empty for a refresh-only credential)
    pub access_token: String,

    /// Long-lived token used to mint new access tokens
    pub refresh_token: Option<String>,

    /// Absolute expiry of `access_token`
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// A credential that only carries a refresh token.
    ///
    /// The access token is empty and already expired, so the next
    /// `get_valid_access_token` always refreshes.
    pub fn refresh_only(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: Some(refresh_token.into()),
            expires_at: DateTime::<Utc>::default(),
        }
    }

    /// Build a credential from a token endpoint grant.
    ///
    /// `previous_refresh` is kept when the provider does not rotate the
    /// refresh token.
    pub fn from_grant(
        grant: TokenGrant,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(previous_refresh),
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// True when the access token outlives `now + buffer`.
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.has_access_token() && self.expires_at - buffer > now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Seconds until expiry, floored at zero.
    pub fn expires_in_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Token endpoint response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// Persistence for the session's credential.
///
/// Implementations decide where the credential lives (process memory,
/// HTTP cookies); the token manager only sees load/save/clear.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>>;

    async fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove every stored token. Must be idempotent.
    async fn clear(&self) -> Result<()>;
}

/// In-process credential store for a single session.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.credential.read().await.clone())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        *self.credential.write().await = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.credential.write().await.take();
        Ok(())
    }
}
