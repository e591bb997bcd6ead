/// Profile API route
use crate::{error::Result, middleware::Session};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub id: String,
    pub display_name: Option<String>,
    pub product: String,
    /// Whether the account may use the full-track remote player
    pub premium: bool,
}

/// GET /api/me
pub async fn me(session: Session) -> Result<Json<MeResponse>> {
    let api = session.api().await?;
    let profile = api.current_user().await?;

    Ok(Json(MeResponse {
        ok: true,
        product: profile.product().to_string(),
        premium: profile.is_premium(),
        id: profile.id,
        display_name: profile.display_name,
    }))
}
