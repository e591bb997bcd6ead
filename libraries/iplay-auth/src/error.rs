//! Error types for the credential and token lifecycle layer.

use thiserror::Error;

/// Errors that can occur while obtaining or refreshing OAuth credentials.
///
/// The type is `Clone` so a single refresh outcome can be handed to every
/// caller waiting on the same in-flight exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential is stored, or the stored one can no longer be used
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The token endpoint rejected a code or refresh exchange
    #[error("Token exchange failed ({status}): {message}")]
    ExchangeFailed { status: u16, message: String },

    /// A refresh was required and did not succeed
    #[error("Session expired: {0}")]
    Expired(String),

    /// Rate limited by the token endpoint
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Token endpoint could not be reached
    #[error("Token endpoint unreachable: {0}")]
    Unreachable(String),

    /// Failed to parse the token endpoint response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Credential store failed to read or write
    #[error("Credential store error: {0}")]
    Store(String),

    /// Invalid client configuration (missing id/secret, bad URL)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Whether the provider explicitly refused the grant.
    ///
    /// A rejection invalidates stored credentials; transport failures do not.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::ExchangeFailed { status, .. } if *status == 400 || *status == 401
        )
    }
}

/// Result type for credential and token operations.
pub type Result<T> = std::result::Result<T, AuthError>;
