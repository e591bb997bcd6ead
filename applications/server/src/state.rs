/// Shared application state
use crate::{
    config::ServerConfig,
    error::{Result, ServerError},
};
use iplay_auth::{OAuthConfig, RefreshCoalescer, TokenEndpoint};
use std::{sync::Arc, time::Duration};

/// Application state shared across all handlers
///
/// Per-session credentials never live here; they travel in cookies and
/// are wrapped per request by the session middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// `None` until client credentials are configured
    pub endpoint: Option<Arc<TokenEndpoint>>,
    /// Shared so concurrent requests holding the same refresh token
    /// trigger one exchange
    pub coalescer: Arc<RefreshCoalescer>,
    /// Connection pool for upstream API calls
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let endpoint = if config.upstream.is_configured() {
            let oauth = OAuthConfig::new(
                config.upstream.client_id.clone(),
                config.upstream.client_secret.clone(),
            )
            .with_accounts_url(config.upstream.accounts_url.clone());

            let endpoint = TokenEndpoint::new(oauth)
                .map_err(|e| ServerError::Config(e.to_string()))?;
            Some(Arc::new(endpoint))
        } else {
            tracing::warn!("Client credentials not configured, sign-in is disabled");
            None
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("iPlay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            endpoint,
            coalescer: Arc::new(RefreshCoalescer::default()),
            http,
        })
    }

    /// Token endpoint, or a configuration error when sign-in is disabled
    pub fn endpoint(&self) -> Result<Arc<TokenEndpoint>> {
        self.endpoint
            .clone()
            .ok_or_else(|| ServerError::Config("Client credentials not configured".to_string()))
    }

    /// Whether cookies get the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.server.production
    }
}
