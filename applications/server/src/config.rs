/// Server configuration
use crate::error::{Result, ServerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Values shipped in the sample `.env`, treated as unset
const PLACEHOLDER_CLIENT_ID: &str = "your_spotify_client_id_here";
const PLACEHOLDER_CLIENT_SECRET: &str = "your_spotify_client_secret_here";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Marks cookies `Secure` and hides credential diagnostics
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamSettings {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Must match the redirect URI registered with the provider exactly
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_refresh_token_max_age")]
    pub refresh_token_max_age_secs: i64,

    #[serde(default = "default_auth_state_max_age")]
    pub auth_state_max_age_secs: i64,
}

impl ServerConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `config.toml` in the working
    /// directory is used when present. `IPLAY_`-prefixed variables override
    /// both, with `__` between section and key (`IPLAY_SERVER__PORT`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("IPLAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.upstream.has_client_id() {
            return Err(ServerError::Config(
                "Client id is required (set IPLAY_UPSTREAM__CLIENT_ID)".to_string(),
            ));
        }

        if !self.upstream.has_client_secret() {
            return Err(ServerError::Config(
                "Client secret is required (set IPLAY_UPSTREAM__CLIENT_SECRET)".to_string(),
            ));
        }

        url::Url::parse(&self.upstream.redirect_uri)
            .map_err(|e| ServerError::Config(format!("Invalid redirect URI: {}", e)))?;

        Ok(())
    }
}

impl UpstreamSettings {
    pub fn has_client_id(&self) -> bool {
        !self.client_id.is_empty() && self.client_id != PLACEHOLDER_CLIENT_ID
    }

    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.is_empty() && self.client_secret != PLACEHOLDER_CLIENT_SECRET
    }

    pub fn is_configured(&self) -> bool {
        self.has_client_id() && self.has_client_secret()
    }
}

// Default values
impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            production: false,
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            accounts_url: default_accounts_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_token_max_age_secs: default_refresh_token_max_age(),
            auth_state_max_age_secs: default_auth_state_max_age(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:3000/api/auth/callback".to_string()
}

fn default_accounts_url() -> String {
    iplay_auth::DEFAULT_ACCOUNTS_URL.to_string()
}

fn default_api_base_url() -> String {
    iplay_web_api::DEFAULT_API_BASE.to_string()
}

fn default_refresh_token_max_age() -> i64 {
    60 * 60 * 24 * 30
}

fn default_auth_state_max_age() -> i64 {
    60 * 10
}
