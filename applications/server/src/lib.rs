//! iPlay Server Library
//!
//! HTTP surface for the iPlay session core: OAuth sign-in with cookie-held
//! credentials, session token hand-out for the browser player, and thin
//! proxies over the upstream player and catalog endpoints.
//!
//! The router is exposed here so integration tests can drive it with
//! `tower::ServiceExt::oneshot`.

pub mod api;
pub mod config;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod session;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

// Re-export commonly used types for convenience
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use session::CookieSession;
pub use state::AppState;

/// Build the application router
pub fn create_router(app_state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/login", get(api::auth::login))
        .route("/auth/callback", get(api::auth::callback))
        .route("/auth/refresh", get(api::auth::refresh))
        .route("/auth/session", get(api::auth::session))
        .route(
            "/auth/logout",
            get(api::auth::logout).post(api::auth::logout),
        )
        .route("/auth/check-env", get(api::auth::check_env));

    let upstream_routes = Router::new()
        .route("/me", get(api::me::me))
        .route("/track/:id", get(api::track::get_track))
        .route("/player/devices", get(api::player::devices))
        .route("/player/transfer", post(api::player::transfer))
        .route("/player/play", post(api::player::play))
        .route("/player/resume", post(api::player::resume))
        .route("/player/pause", post(api::player::pause))
        .route("/player/next", post(api::player::next))
        .route("/player/previous", post(api::player::previous))
        .route("/player/seek", post(api::player::seek))
        .route("/player/volume", post(api::player::volume));

    Router::new()
        .route("/health", get(api::health::health))
        .nest("/api", auth_routes.merge(upstream_routes))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            middleware::session_cookies,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
