//! iPlay Web API Client
//!
//! HTTP client for the upstream music service's Web API.
//!
//! # Features
//!
//! - **Playback control**: transfer, start, resume, pause, seek, skip, volume
//! - **Devices**: list devices, start with no-active-device recovery
//! - **Catalog**: track lookup (preview URL, duration, artists)
//! - **Profile**: current user and premium entitlement
//! - **Rate limits**: GET requests retried with `Retry-After`/exponential backoff
//!
//! [`WebApiClient`] also implements [`iplay_playback::RemotePlaybackApi`], so
//! it can be handed straight to a `PlaybackOrchestrator`.
//!
//! # Example
//!
//! ```ignore
//! use iplay_web_api::{PlayRequest, WebApiClient};
//!
//! let client = WebApiClient::new(token_manager)?;
//!
//! let me = client.current_user().await?;
//! println!("{} premium={}", me.id, me.is_premium());
//!
//! let request = PlayRequest::uris(vec!["spotify:track:4uLU6hMCjMI75M1A2tKUQC".into()]);
//! let device = client.start_playback_with_recovery(Some("web-player"), &request).await?;
//! ```

mod client;
mod error;
mod remote;
mod retry;
mod types;

pub use client::{WebApiClient, DEFAULT_API_BASE};
pub use error::{ApiError, Result};
pub use retry::RetryPolicy;
pub use types::{ApiAlbum, ApiArtist, ApiImage, ApiTrack, Device, PlayOffset, PlayRequest, UserProfile};
