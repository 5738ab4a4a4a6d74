//! Access token gate for protected routes
//!
//! [`AuthGate`] checks a bearer access token and yields the subject id.
//! [`AuthenticatedUser`] wraps it as an axum extractor so handlers only run
//! for requests carrying a valid access token.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use uuid::Uuid;

use crate::core::auth::jwt::{TokenClass, TokenCodec};
use crate::core::auth::service::AuthError;

/// Verifies access tokens. Performs no storage lookup.
#[derive(Clone)]
pub struct AuthGate {
    codec: TokenCodec,
}

impl AuthGate {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    /// Check an access token and return its subject.
    ///
    /// Expired, forged, malformed and refresh-class tokens all fail the same way.
    pub fn authenticate(&self, token: &str) -> Result<Uuid, AuthError> {
        self.codec.verify(token, TokenClass::Access).map_err(|e| {
            tracing::debug!(reason = %e, "Access token rejected");
            AuthError::Unauthorized
        })
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Subject of a verified access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AuthGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthError::Unauthorized)?;

        let gate = AuthGate::from_ref(state);
        let user_id = gate.authenticate(bearer.token())?;

        Ok(AuthenticatedUser { user_id })
    }
}
