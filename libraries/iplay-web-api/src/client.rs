//! Upstream Web API client.

use crate::error::{ApiError, Result};
use crate::retry::{ceil_secs, RetryPolicy};
use crate::types::{
    ApiTrack, Device, DevicesResponse, PlayRequest, TransferRequest, UserProfile,
};
use iplay_auth::{retry_after_secs, AccessTokenProvider};
use iplay_playback::{pick_best_device, DeviceInfo};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Production API base URL
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// How a 404 from an endpoint should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// `/me/player*`: 404 means no active device
    Player,
    /// Catalog and profile: 404 means the resource does not exist
    Resource,
}

struct Call<'a> {
    method: Method,
    path: &'a str,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    scope: Scope,
}

impl<'a> Call<'a> {
    fn new(method: Method, path: &'a str, scope: Scope) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
            scope,
        }
    }

    fn device(mut self, device_id: Option<&str>) -> Self {
        if let Some(id) = device_id.filter(|id| !id.is_empty()) {
            self.query.push(("device_id", id.to_string()));
        }
        self
    }

    fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Client for the upstream playback-control and catalog API.
///
/// Every request carries a bearer token taken from the given
/// [`AccessTokenProvider`], so a token manager refreshes transparently.
/// Rate-limited GET requests are retried per [`RetryPolicy`]; control
/// calls surface `RateLimited` immediately.
#[derive(Clone)]
pub struct WebApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
    retry: RetryPolicy,
}

impl WebApiClient {
    /// Create a client against the production API.
    pub fn new(tokens: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE, tokens)
    }

    /// Create a client against another base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("iPlay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        Self::with_http_client(http, base_url, tokens)
    }

    /// Create a client that shares an existing connection pool.
    ///
    /// The server builds one `reqwest::Client` and hands it to a client per
    /// request, each with that request's session tokens.
    pub fn with_http_client(
        http: Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ApiError::InvalidUrl("URL cannot be empty".into()));
        }

        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        Ok(Self {
            http,
            base_url,
            tokens,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the read-path retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current user's profile (`GET /me`).
    pub async fn current_user(&self) -> Result<UserProfile> {
        self.get_json("/me", Scope::Resource)
            .await?
            .ok_or_else(|| ApiError::ParseError("Empty profile response".into()))
    }

    /// Devices available for playback (`GET /me/player/devices`).
    pub async fn available_devices(&self) -> Result<Vec<Device>> {
        let response: Option<DevicesResponse> =
            self.get_json("/me/player/devices", Scope::Player).await?;
        let devices = response.map(|r| r.devices).unwrap_or_default();
        debug!(count = devices.len(), "Fetched devices");
        Ok(devices)
    }

    /// Catalog track (`GET /tracks/{id}`).
    pub async fn track(&self, track_id: &str) -> Result<ApiTrack> {
        if track_id.is_empty() || track_id.contains('/') {
            return Err(ApiError::InvalidRequest(format!(
                "Invalid track id: {:?}",
                track_id
            )));
        }
        let path = format!("/tracks/{}", track_id);
        self.get_json(&path, Scope::Resource)
            .await?
            .ok_or_else(|| ApiError::ParseError("Empty track response".into()))
    }

    // =========================================================================
    // Playback Control
    // =========================================================================

    /// Move playback to `device_id` (`PUT /me/player`).
    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> Result<()> {
        if device_id.is_empty() {
            return Err(ApiError::InvalidRequest("No device id provided".into()));
        }
        let body = TransferRequest {
            device_ids: [device_id],
            play,
        };
        self.control(Call::new(Method::PUT, "/me/player", Scope::Player).json(&body)?)
            .await
    }

    /// Start playback of `request` (`PUT /me/player/play`).
    pub async fn start_playback(&self, device_id: Option<&str>, request: &PlayRequest) -> Result<()> {
        if !request.has_target() {
            return Err(ApiError::InvalidRequest("Nothing to play".into()));
        }
        self.control(
            Call::new(Method::PUT, "/me/player/play", Scope::Player)
                .device(device_id)
                .json(request)?,
        )
        .await
    }

    /// Resume whatever is loaded (`PUT /me/player/play` with an empty body).
    pub async fn resume_playback(&self, device_id: Option<&str>) -> Result<()> {
        self.control(
            Call::new(Method::PUT, "/me/player/play", Scope::Player)
                .device(device_id)
                .json(&serde_json::json!({}))?,
        )
        .await
    }

    pub async fn pause_playback(&self, device_id: Option<&str>) -> Result<()> {
        self.control(Call::new(Method::PUT, "/me/player/pause", Scope::Player).device(device_id))
            .await
    }

    pub async fn seek_to(&self, position_ms: u64, device_id: Option<&str>) -> Result<()> {
        self.control(
            Call::new(Method::PUT, "/me/player/seek", Scope::Player)
                .query("position_ms", position_ms)
                .device(device_id),
        )
        .await
    }

    pub async fn skip_to_next(&self, device_id: Option<&str>) -> Result<()> {
        self.control(Call::new(Method::POST, "/me/player/next", Scope::Player).device(device_id))
            .await
    }

    pub async fn skip_to_previous(&self, device_id: Option<&str>) -> Result<()> {
        self.control(
            Call::new(Method::POST, "/me/player/previous", Scope::Player).device(device_id),
        )
        .await
    }

    /// Set device volume; `volume_percent` is capped at 100.
    pub async fn set_volume(&self, volume_percent: u8, device_id: Option<&str>) -> Result<()> {
        self.control(
            Call::new(Method::PUT, "/me/player/volume", Scope::Player)
                .query("volume_percent", volume_percent.min(100))
                .device(device_id),
        )
        .await
    }

    /// Start playback, recovering from a missing active device.
    ///
    /// On `NoActiveDevice` the requested device (if any) is transferred to
    /// and the start retried; if that also finds no device, the device list
    /// is consulted and the best entry is transferred to with `play=true`.
    /// Returns the device playback ended up on, if known.
    pub async fn start_playback_with_recovery(
        &self,
        device_id: Option<&str>,
        request: &PlayRequest,
    ) -> Result<Option<String>> {
        let first = match self.start_playback(device_id, request).await {
            Ok(()) => return Ok(device_id.map(str::to_string)),
            Err(ApiError::NoActiveDevice) => ApiError::NoActiveDevice,
            Err(err) => return Err(err),
        };

        if let Some(device) = device_id {
            debug!(device_id = %device, "No active device, transferring and retrying");
            let retried = async {
                self.transfer_playback(device, false).await?;
                self.start_playback(Some(device), request).await
            };
            match retried.await {
                Ok(()) => return Ok(Some(device.to_string())),
                Err(ApiError::NoActiveDevice) => {}
                Err(err) => return Err(err),
            }
        }

        let devices: Vec<DeviceInfo> = self
            .available_devices()
            .await?
            .into_iter()
            .map(DeviceInfo::from)
            .collect();
        let Some(best) = pick_best_device(&devices, device_id).map(str::to_string) else {
            warn!("No devices available for playback");
            return Err(first);
        };

        info!(device_id = %best, "Starting playback on listed device");
        self.transfer_playback(&best, true).await?;
        self.start_playback(Some(&best), request).await?;
        Ok(Some(best))
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn get_json<T: DeserializeOwned>(&self, path: &str, scope: Scope) -> Result<Option<T>> {
        let response = self.execute(Call::new(Method::GET, path, scope)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Unreachable(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ApiError::ParseError(format!("{} response: {}", path, e)))
    }

    async fn control(&self, call: Call<'_>) -> Result<()> {
        self.execute(call).await.map(|_| ())
    }

    async fn execute(&self, call: Call<'_>) -> Result<Response> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}{}", self.base_url, call.path);
        let max_retries = if call.method == Method::GET {
            self.retry.max_retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            let mut request = self
                .http
                .request(call.method.clone(), &url)
                .bearer_auth(&token)
                .query(&call.query);
            request = match &call.body {
                Some(body) => request.json(body),
                None => request.header(reqwest::header::CONTENT_LENGTH, 0),
            };

            debug!(method = %call.method, path = %call.path, attempt, "Upstream request");
            let response = request.send().await.map_err(|e| {
                warn!(path = %call.path, error = %e, "Upstream request failed");
                ApiError::Unreachable(e.to_string())
            })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let backoff = self
                    .retry
                    .backoff(attempt, retry_after_secs(response.headers()));
                if attempt < max_retries {
                    warn!(
                        path = %call.path,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                return Err(ApiError::RateLimited {
                    retry_after_secs: ceil_secs(backoff),
                });
            }

            let message = error_message(response).await;
            debug!(path = %call.path, status = status.as_u16(), message = %message, "Upstream error");
            return Err(match (status.as_u16(), call.scope) {
                (401, _) => ApiError::Unauthorized(message),
                (403, _) => ApiError::Forbidden(message),
                (404, Scope::Player) => ApiError::NoActiveDevice,
                (404, Scope::Resource) => ApiError::NotFound(message),
                (status, _) => ApiError::Upstream { status, message },
            });
        }
    }
}

/// Best-effort message from an upstream error body
async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    };

    match response.json::<Value>().await {
        Ok(body) => body["error"]["message"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => fallback(),
    }
}
