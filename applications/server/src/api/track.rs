/// Track metadata API route
use crate::{error::Result, middleware::Session};
use axum::{extract::Path, Json};
use iplay_web_api::ApiArtist;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub ok: bool,
    #[serde(rename = "previewUrl")]
    pub preview_url: Option<String>,
    pub name: String,
    pub artists: Vec<ApiArtist>,
    pub duration_ms: u64,
}

/// GET /api/track/:id
///
/// Used by the player to find a preview clip when a track arrives without
/// one.
pub async fn get_track(session: Session, Path(id): Path<String>) -> Result<Json<TrackResponse>> {
    let api = session.api().await?;
    let track = api.track(&id).await?;

    Ok(Json(TrackResponse {
        ok: true,
        preview_url: track.preview().map(str::to_string),
        name: track.name,
        artists: track.artists,
        duration_ms: track.duration_ms,
    }))
}
