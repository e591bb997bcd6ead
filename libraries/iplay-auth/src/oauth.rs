//! Client for the provider's OAuth token endpoint.

use crate::credential::TokenGrant;
use crate::error::{AuthError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default accounts service base URL.
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Scopes requested at login.
pub const SCOPES: &[&str] = &[
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-read-private",
    "user-read-email",
    "user-library-read",
    "user-top-read",
    "user-read-recently-played",
    "streaming",
    "user-read-playback-state",
    "user-modify-playback-state",
];

/// Client registration used against the token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub accounts_url: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
        }
    }

    /// Point the client at a different accounts service (tests, proxies).
    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: Option<String>,
    error_description: Option<String>,
}

/// Performs authorization-code and refresh-token exchanges.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    http: Client,
    config: OAuthConfig,
}

impl TokenEndpoint {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(AuthError::InvalidConfig("client id is required".into()));
        }

        let accounts_url = config.accounts_url.trim_end_matches('/').to_string();
        if !accounts_url.starts_with("http://") && !accounts_url.starts_with("https://") {
            return Err(AuthError::InvalidConfig(
                "accounts URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("iPlay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            config: OAuthConfig {
                accounts_url,
                ..config
            },
        })
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Build the provider's authorize URL for the code flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(&format!("{}/authorize", self.config.accounts_url))
            .map_err(|e| AuthError::InvalidConfig(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("show_dialog", "true")
            .append_pair("state", state);

        Ok(url.into())
    }

    /// Exchange a single-use authorization code.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant> {
        debug!(redirect_uri = %redirect_uri, "Exchanging authorization code");

        let grant = self
            .post_form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        if grant.access_token.is_empty() {
            warn!("Token endpoint returned no access token");
            return Err(AuthError::ExchangeFailed {
                status: 200,
                message: "no access token in response".to_string(),
            });
        }

        info!(
            expires_in = ?grant.expires_in,
            has_refresh = grant.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(grant)
    }

    /// Mint a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        debug!("Refreshing access token");

        let grant = self
            .post_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        if grant.access_token.is_empty() {
            return Err(AuthError::ExchangeFailed {
                status: 200,
                message: "no access token in response".to_string(),
            });
        }

        debug!(rotated = grant.refresh_token.is_some(), "Token refresh successful");
        Ok(grant)
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenGrant> {
        let url = format!("{}/api/token", self.config.accounts_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            response
                .json::<TokenGrant>()
                .await
                .map_err(|e| AuthError::ParseError(format!("Failed to parse token response: {}", e)))
        } else if status.as_u16() == 429 {
            let retry_after_secs = retry_after_secs(response.headers()).unwrap_or(1);
            warn!(retry_after_secs, "Token endpoint rate limited");
            Err(AuthError::RateLimited { retry_after_secs })
        } else {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            warn!(status = %status, error = %message, "Token exchange rejected");
            Err(AuthError::ExchangeFailed {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
