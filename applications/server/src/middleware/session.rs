/// Session cookie middleware
use crate::{
    cookies,
    error::{Result, ServerError, UpstreamAuthRejected},
    session::CookieSession,
    state::AppState,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use iplay_auth::{CredentialStore, TokenManager};
use iplay_web_api::WebApiClient;
use std::sync::Arc;

/// Middleware that reads the session cookies into a [`CookieSession`] and
/// writes back whatever the handler changed
pub async fn session_cookies(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = Arc::new(CookieSession::from_headers(request.headers()));
    request.extensions_mut().insert(Arc::clone(&session));

    let mut response = next.run(request).await;

    if let Some(rejection) = response.extensions().get::<UpstreamAuthRejected>().copied() {
        let session = Session {
            store: Arc::clone(&session),
            state: state.clone(),
        };
        if let Err(e) = session.handle_upstream_rejection(rejection).await {
            tracing::warn!(error = %e, "Could not repair rejected session");
        }
    }

    let pending = session
        .pending_cookies(
            &state.config.session,
            state.secure_cookies(),
            chrono::Utc::now(),
        )
        .await;
    if !pending.is_empty() {
        tracing::debug!(count = pending.len(), "Writing session cookies");
    }
    cookies::append(response.headers_mut(), &pending);

    response
}

/// The current request's session, usable as an extractor
#[derive(Clone)]
pub struct Session {
    store: Arc<CookieSession>,
    state: AppState,
}

impl Session {
    pub fn store(&self) -> Arc<CookieSession> {
        Arc::clone(&self.store)
    }

    /// Token manager over this request's cookies
    pub fn tokens(&self) -> Result<TokenManager> {
        let endpoint = self.state.endpoint()?;
        let store: Arc<dyn CredentialStore> = self.store();
        Ok(TokenManager::new(endpoint, store).with_coalescer(Arc::clone(&self.state.coalescer)))
    }

    /// Upstream API client authorized by this session
    ///
    /// Fails with `NotAuthenticated` before any upstream call when the
    /// request carries no credential cookies.
    pub async fn api(&self) -> Result<WebApiClient> {
        if self.store.load().await?.is_none() {
            return Err(ServerError::NotAuthenticated);
        }

        let tokens = Arc::new(self.tokens()?);
        WebApiClient::with_http_client(
            self.state.http.clone(),
            self.state.config.upstream.api_base_url.clone(),
            tokens,
        )
        .map_err(|e| ServerError::Config(e.to_string()))
    }
}

impl Session {
    /// Repair or drop a credential the upstream refused
    ///
    /// With a refresh token, a 401 is answered with a forced refresh; a
    /// rejected refresh clears the store by itself. Without one nothing can
    /// repair the credential, so it is invalidated.
    pub async fn handle_upstream_rejection(&self, rejection: UpstreamAuthRejected) -> Result<()> {
        let refreshable = matches!(
            self.store.load().await?,
            Some(ref credential) if credential.refresh_token.is_some()
        );

        if !refreshable {
            tracing::info!(status = rejection.status, "Upstream rejected session, signing out");
            match self.tokens() {
                Ok(tokens) => tokens.invalidate().await?,
                Err(_) => self.store.clear().await?,
            }
            return Ok(());
        }

        if rejection.status == 401 {
            tracing::info!("Upstream rejected access token, refreshing");
            self.tokens()?.refresh().await?;
        }
        Ok(())
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let store = parts
            .extensions
            .get::<Arc<CookieSession>>()
            .cloned()
            .ok_or_else(|| ServerError::Internal("Session middleware not installed".to_string()))?;

        Ok(Self {
            store,
            state: state.clone(),
        })
    }
}
