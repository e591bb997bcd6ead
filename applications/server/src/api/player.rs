/// Remote player control API routes
///
/// Thin wrappers over the upstream player endpoints. Every route checks
/// the session before looking at the body, so a signed-out caller gets
/// `NOT_AUTHENTICATED` rather than a validation error.
use crate::{
    error::{Result, ServerError},
    middleware::Session,
};
use axum::Json;
use iplay_web_api::{Device, PlayOffset, PlayRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBody {
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub play: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayBody {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub uris: Option<Vec<String>>,
    #[serde(default)]
    pub position_ms: Option<u64>,
    #[serde(default)]
    pub offset: Option<PlayOffset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekBody {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub position_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeBody {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub ok: bool,
    pub devices: Vec<Device>,
}

/// Unwrap an optional JSON body, treating a missing or malformed body as
/// empty
fn body<T: Default>(body: Option<Json<T>>) -> T {
    body.map(|Json(b)| b).unwrap_or_default()
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// GET /api/player/devices
pub async fn devices(session: Session) -> Result<Json<DevicesResponse>> {
    let api = session.api().await?;
    let devices = api.available_devices().await?;
    Ok(Json(DevicesResponse { ok: true, devices }))
}

/// POST /api/player/transfer
pub async fn transfer(
    session: Session,
    payload: Option<Json<TransferBody>>,
) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);

    let device_id = req
        .device_id
        .filter(|id| !id.is_empty())
        .ok_or(ServerError::MissingField("device_id"))?;

    api.transfer_playback(&device_id, req.play).await?;
    tracing::info!(device_id = %device_id, play = req.play, "Playback transferred");
    Ok(ok())
}

/// POST /api/player/play
///
/// Starts the given URIs, recovering from a missing active device by
/// transferring and retrying.
pub async fn play(session: Session, payload: Option<Json<PlayBody>>) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);

    let uris: Vec<String> = match req.uris {
        Some(uris) if uris.iter().any(|u| !u.is_empty()) => {
            uris.into_iter().filter(|u| !u.is_empty()).collect()
        }
        _ => req
            .uri
            .filter(|u| !u.is_empty())
            .map(|u| vec![u])
            .ok_or(ServerError::MissingField("uri"))?,
    };

    let mut request = PlayRequest::uris(uris).at_position(req.position_ms.unwrap_or(0));
    if let Some(offset) = req.offset {
        request = request.with_offset(offset);
    }

    let device_id = api
        .start_playback_with_recovery(req.device_id.as_deref(), &request)
        .await?;

    Ok(Json(json!({ "ok": true, "deviceId": device_id })))
}

/// POST /api/player/resume
pub async fn resume(session: Session, payload: Option<Json<DeviceBody>>) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);
    api.resume_playback(req.device_id.as_deref()).await?;
    Ok(ok())
}

/// POST /api/player/pause
pub async fn pause(session: Session, payload: Option<Json<DeviceBody>>) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);
    api.pause_playback(req.device_id.as_deref()).await?;
    Ok(ok())
}

/// POST /api/player/next
pub async fn next(session: Session, payload: Option<Json<DeviceBody>>) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);
    api.skip_to_next(req.device_id.as_deref()).await?;
    Ok(ok())
}

/// POST /api/player/previous
pub async fn previous(
    session: Session,
    payload: Option<Json<DeviceBody>>,
) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);
    api.skip_to_previous(req.device_id.as_deref()).await?;
    Ok(ok())
}

/// POST /api/player/seek
pub async fn seek(session: Session, payload: Option<Json<SeekBody>>) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);

    let position_ms = req
        .position_ms
        .ok_or(ServerError::MissingField("position_ms"))?;

    api.seek_to(position_ms, req.device_id.as_deref()).await?;
    Ok(ok())
}

/// POST /api/player/volume
pub async fn volume(session: Session, payload: Option<Json<VolumeBody>>) -> Result<Json<Value>> {
    let api = session.api().await?;
    let req = body(payload);

    let percent = req
        .volume_percent
        .ok_or(ServerError::MissingField("volume_percent"))?;

    api.set_volume(percent.min(100) as u8, req.device_id.as_deref())
        .await?;
    Ok(ok())
}
