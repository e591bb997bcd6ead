/// Authentication API routes
use crate::{
    cookies::{self, SetCookie, AUTH_NEXT, AUTH_STATE},
    error::Result,
    middleware::Session,
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use iplay_auth::{
    redirect::{normalize_loopback_url, preferred_origin, safe_next_path},
    AuthError, CredentialStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Where a completed sign-in lands when no safe `next` was given
const DEFAULT_SIGN_IN_NEXT: &str = "/dashboard";
/// Where a forced refresh lands when no safe `next` was given
const DEFAULT_REFRESH_NEXT: &str = "/";

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub ok: bool,
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckEnvResponse {
    pub has_client_id: bool,
    pub has_client_secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id_preview: Option<String>,
    pub is_configured: bool,
    pub message: String,
}

/// Externally visible origin of the request
fn request_origin(headers: &HeaderMap) -> String {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    preferred_origin(
        get("x-forwarded-proto"),
        get("x-forwarded-host"),
        get(header::HOST.as_str()),
    )
}

fn redirect_to(origin: &str, path: &str) -> Response {
    Redirect::temporary(&format!("{}{}", origin, path)).into_response()
}

/// Redirect to the login page with an `error` (and optional `details`)
fn login_error(origin: &str, error: &str, details: Option<&str>) -> Response {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("error", error);
    if let Some(details) = details {
        query.append_pair("details", details);
    }
    redirect_to(origin, &format!("/login?{}", query.finish()))
}

/// GET /api/auth/login
pub async fn login(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Response {
    let origin = request_origin(&headers);
    let next = safe_next_path(query.next.as_deref(), DEFAULT_SIGN_IN_NEXT);

    let Ok(endpoint) = app_state.endpoint() else {
        tracing::warn!("Sign-in attempted without client credentials");
        return login_error(&origin, "config_error", None);
    };

    let redirect_uri = normalize_loopback_url(&app_state.config.upstream.redirect_uri);
    let csrf_state = hex::encode(rand::random::<[u8; 16]>());

    let authorize_url = match endpoint.authorize_url(&redirect_uri, &csrf_state) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build authorize URL");
            return login_error(&origin, "config_error", None);
        }
    };

    let max_age = app_state.config.session.auth_state_max_age_secs;
    let secure = app_state.secure_cookies();

    let mut response = Redirect::temporary(&authorize_url).into_response();
    cookies::append(
        response.headers_mut(),
        &[
            SetCookie::new(AUTH_STATE, csrf_state, max_age).secure(secure),
            SetCookie::new(AUTH_NEXT, cookies::encode_value(&next), max_age).secure(secure),
        ],
    );
    response
}

/// GET /api/auth/callback
///
/// The transient state and next cookies are cleared whatever the outcome.
pub async fn callback(
    State(app_state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let origin = request_origin(&headers);
    let jar = cookies::parse(&headers);
    let expected_state = jar.get(AUTH_STATE).filter(|v| !v.is_empty());
    let next = jar.get(AUTH_NEXT).map(|v| cookies::decode_value(v));
    let next = safe_next_path(next.as_deref(), DEFAULT_SIGN_IN_NEXT);

    let mut response = match complete_sign_in(&app_state, &session, &query, expected_state).await
    {
        Ok(()) => redirect_to(&origin, &next),
        Err((error, details)) => login_error(&origin, &error, details.as_deref()),
    };

    let secure = app_state.secure_cookies();
    cookies::append(
        response.headers_mut(),
        &[
            SetCookie::removal(AUTH_STATE).secure(secure),
            SetCookie::removal(AUTH_NEXT).secure(secure),
        ],
    );
    response
}

/// Error code and details for the login page on failure
async fn complete_sign_in(
    app_state: &AppState,
    session: &Session,
    query: &CallbackQuery,
    expected_state: Option<&String>,
) -> std::result::Result<(), (String, Option<String>)> {
    if let Some(error) = query.error.as_deref().filter(|e| !e.is_empty()) {
        tracing::warn!(error = %error, "Provider denied authorization");
        return Err((error.to_string(), None));
    }

    match (expected_state, query.state.as_ref()) {
        (Some(expected), Some(actual)) if expected == actual => {}
        _ => {
            tracing::warn!("Authorization state mismatch");
            return Err(("state_mismatch".to_string(), None));
        }
    }

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        return Err(("no_code".to_string(), None));
    };

    let tokens = session
        .tokens()
        .map_err(|_| ("config_error".to_string(), None))?;

    match tokens
        .exchange_authorization_code(code, &app_state.config.upstream.redirect_uri)
        .await
    {
        Ok(credential) => {
            tracing::info!(
                expires_at = %credential.expires_at,
                "Sign-in completed"
            );
            Ok(())
        }
        // Accepted by the provider but carried no access token
        Err(AuthError::ExchangeFailed { status: 200, .. }) => {
            tracing::warn!("Token response carried no access token");
            Err(("invalid_token".to_string(), None))
        }
        Err(AuthError::ExchangeFailed { status, message }) => {
            tracing::warn!(status, message = %message, "Token exchange failed");
            Err(("token_exchange_failed".to_string(), Some(message)))
        }
        Err(AuthError::ParseError(message)) => {
            tracing::warn!(message = %message, "Token response unusable");
            Err(("invalid_token".to_string(), None))
        }
        Err(e) => {
            tracing::error!(error = %e, "Sign-in failed");
            Err(("server_error".to_string(), None))
        }
    }
}

/// GET /api/auth/refresh
pub async fn refresh(
    session: Session,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Response {
    let origin = request_origin(&headers);
    let next = safe_next_path(query.next.as_deref(), DEFAULT_REFRESH_NEXT);

    let has_refresh_token = matches!(
        session.store().load().await,
        Ok(Some(ref credential)) if credential.refresh_token.is_some()
    );
    if !has_refresh_token {
        return login_error(&origin, "no_refresh_token", None);
    }

    let Ok(tokens) = session.tokens() else {
        return login_error(&origin, "config_error", None);
    };

    match tokens.refresh().await {
        Ok(_) => redirect_to(&origin, &next),
        Err(e) => {
            tracing::warn!(error = %e, "Forced refresh failed");
            let details: String = e.to_string().chars().take(500).collect();
            login_error(&origin, "refresh_failed", Some(&details))
        }
    }
}

/// GET /api/auth/session
///
/// Returns an access token valid for at least the refresh buffer. When a
/// refresh fails for a transient reason the current token is returned as
/// long as it has not expired.
pub async fn session(session: Session) -> Result<Response> {
    let tokens = session.tokens()?;

    match tokens.get_valid_access_token().await {
        Ok(access_token) => Ok(Json(SessionResponse {
            ok: true,
            access_token: Some(access_token),
        })
        .into_response()),
        Err(e) => {
            if let Ok(Some(current)) = tokens.current_credential().await {
                if current.has_access_token() && !current.is_expired(Utc::now()) {
                    tracing::warn!(error = %e, "Refresh failed, serving current token");
                    return Ok(Json(SessionResponse {
                        ok: true,
                        access_token: Some(current.access_token),
                    })
                    .into_response());
                }
            }

            tracing::debug!(error = %e, "No usable session");
            Ok((
                StatusCode::UNAUTHORIZED,
                Json(SessionResponse {
                    ok: false,
                    access_token: None,
                }),
            )
                .into_response())
        }
    }
}

/// GET|POST /api/auth/logout
pub async fn logout(session: Session) -> Result<Json<Value>> {
    session.store().clear().await?;
    tracing::info!("Signed out");
    Ok(Json(json!({ "success": true })))
}

/// GET /api/auth/check-env
pub async fn check_env(State(app_state): State<AppState>) -> Json<CheckEnvResponse> {
    let upstream = &app_state.config.upstream;
    let production = app_state.config.server.production;

    let has_client_id = upstream.has_client_id();
    let has_client_secret = upstream.has_client_secret();
    let is_configured = has_client_id && has_client_secret;

    let hide = |value: usize| (!production).then_some(value);

    Json(CheckEnvResponse {
        has_client_id,
        has_client_secret,
        client_id_length: hide(upstream.client_id.chars().count()),
        client_secret_length: hide(upstream.client_secret.chars().count()),
        client_id_preview: (!production).then(|| preview(&upstream.client_id)),
        is_configured,
        message: if is_configured {
            "Client credentials are configured".to_string()
        } else {
            "Set IPLAY_UPSTREAM__CLIENT_ID and IPLAY_UPSTREAM__CLIENT_SECRET (or the [upstream] section of config.toml)".to_string()
        },
    })
}

/// First and last four characters of a secret-ish value
fn preview(value: &str) -> String {
    if value.is_empty() {
        return "Not set".to_string();
    }

    let chars: Vec<char> = value.chars().collect();
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}
