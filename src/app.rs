//! HTTP application assembly

use std::sync::Arc;

use axum::{
    Router,
    http::{Method, header},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::core::auth::{
    AuthApiState, BcryptVerifier, SessionService, TokenCodec, TokenIssuer, auth_api_router,
};
use crate::core::config::Config;
use crate::core::db::repositories::InMemoryUserRepository;

/// Wire the session service from config
pub fn build_session_service(config: &Config) -> SessionService {
    let codec = TokenCodec::new(config.token_config());

    SessionService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(BcryptVerifier::new(config.bcrypt_cost)),
        TokenIssuer::new(codec),
    )
    .with_logout_revocation(config.logout_revokes_refresh_token)
}

/// Build the full router with CORS and request tracing
pub fn build_app(config: &Config) -> Router {
    let state = AuthApiState::new(build_session_service(config));

    // The refresh cookie needs credentialed CORS, so the origin is explicit
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    auth_api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
