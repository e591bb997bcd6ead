//! iPlay - OAuth session credentials
//!
//! Credential storage and token lifecycle for the upstream music service.
//!
//! # Features
//!
//! - **Code exchange**: authorization-code grant with loopback-normalized redirect URIs
//! - **Transparent refresh**: tokens are refreshed five minutes before expiry
//! - **Single-flight refresh**: concurrent callers share one exchange per refresh token
//! - **Pluggable storage**: in-memory store included, cookie store lives in the server
//!
//! # Example
//!
//! ```ignore
//! use iplay_auth::{MemoryCredentialStore, OAuthConfig, TokenEndpoint, TokenManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = Arc::new(TokenEndpoint::new(OAuthConfig::new("id", "secret"))?);
//!     let manager = TokenManager::new(endpoint, Arc::new(MemoryCredentialStore::new()));
//!
//!     manager
//!         .exchange_authorization_code("code-from-callback", "http://localhost:3000/api/auth/callback")
//!         .await?;
//!
//!     let token = manager.get_valid_access_token().await?;
//!     println!("bearer {}", token);
//!     Ok(())
//! }
//! ```

mod coalesce;
mod credential;
mod error;
mod oauth;
pub mod redirect;
mod token;

pub use coalesce::RefreshCoalescer;
pub use credential::{
    Credential, CredentialStore, MemoryCredentialStore, TokenGrant, DEFAULT_EXPIRES_IN_SECS,
};
pub use error::{AuthError, Result};
pub use oauth::{retry_after_secs, OAuthConfig, TokenEndpoint, DEFAULT_ACCOUNTS_URL, SCOPES};
pub use token::{AccessTokenProvider, TokenManager, DEFAULT_REFRESH_BUFFER_SECS};
