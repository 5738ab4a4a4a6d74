//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /register - Register a new user
//! - POST /login - Login, returns the access token and sets the refresh cookie
//! - POST /logout - Logout (clears the refresh cookie)
//! - POST /protected - Sample resource behind a bearer access token
//! - POST /refresh_token - Rotate the refresh cookie and return a new access token

use axum::{
    Json, Router,
    extract::{FromRef, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::auth::gate::{AuthGate, AuthenticatedUser};
use crate::core::auth::service::{
    AuthError, LoginRequest, RefreshOutcome, RegisterRequest, SessionService,
};

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshtoken";
/// The refresh cookie is only sent to the refresh endpoint
pub const REFRESH_COOKIE_PATH: &str = "/refresh_token";

/// Auth API state containing the session service and the access gate
#[derive(Clone)]
pub struct AuthApiState {
    pub sessions: SessionService,
    pub gate: AuthGate,
}

impl AuthApiState {
    pub fn new(sessions: SessionService) -> Self {
        let gate = AuthGate::new(sessions.codec().clone());
        Self { sessions, gate }
    }
}

impl FromRef<Arc<AuthApiState>> for AuthGate {
    fn from_ref(state: &Arc<AuthApiState>) -> Self {
        state.gate.clone()
    }
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::InvalidEmail | AuthError::InvalidPassword | AuthError::BadRequest => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AuthError::InternalError(detail) => {
                tracing::error!("Internal auth error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ApiError::new(self.kind(), message);

        if matches!(self, AuthError::Busy) {
            return (
                status,
                [(header::RETRY_AFTER, HeaderValue::from_static("1"))],
                Json(body),
            )
                .into_response();
        }

        (status, Json(body)).into_response()
    }
}

/// Unreadable JSON bodies answer with a fixed message; the parser detail stays in the log
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        AuthError::BadRequest
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accesstoken")]
    pub access_token: String,
    pub email: String,
}

/// Response for token refresh. The token is empty when there is no session.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "accesstoken")]
    pub access_token: String,
}

/// Response for the protected resource
#[derive(Debug, Serialize, Deserialize)]
pub struct ProtectedResponse {
    pub data: String,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/protected", post(protected_handler))
        .route("/refresh_token", post(refresh_handler))
        .with_state(state)
}

fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// POST /register
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Json(request) = body?;
    tracing::debug!("Registration attempt for email: {}", request.email);

    state.sessions.register(request).await?;

    Ok(Json(MessageResponse::new("User Created")))
}

/// POST /login
/// Returns the access token in the body and the refresh token as a cookie
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let Json(request) = body?;
    tracing::debug!("Login attempt for email: {}", request.email);

    let session = state.sessions.login(request).await?;

    let jar = jar.add(refresh_cookie(session.tokens.refresh_token));

    Ok((
        jar,
        Json(LoginResponse {
            access_token: session.tokens.access_token,
            email: session.user.email,
        }),
    ))
}

/// POST /logout
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    state.sessions.logout(presented.as_deref()).await;

    // Path-scoped cookies usually aren't sent here, so always emit the removal
    let mut removal = Cookie::build((REFRESH_COOKIE, ""))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    removal.make_removal();

    (jar.add(removal), Json(MessageResponse::new("Logged out")))
}

/// POST /protected
async fn protected_handler(user: AuthenticatedUser) -> Json<ProtectedResponse> {
    tracing::debug!(user_id = %user.user_id, "Protected resource accessed");

    Json(ProtectedResponse {
        data: "This is protected data.".to_string(),
    })
}

/// POST /refresh_token
/// Rotates the refresh cookie. Any rejection answers with an empty token.
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), AuthError> {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    match state.sessions.refresh(presented.as_deref()).await? {
        RefreshOutcome::Rotated(tokens) => {
            let jar = jar.add(refresh_cookie(tokens.refresh_token));
            Ok((
                jar,
                Json(RefreshResponse {
                    access_token: tokens.access_token,
                }),
            ))
        }
        RefreshOutcome::NoSession => Ok((
            jar,
            Json(RefreshResponse {
                access_token: String::new(),
            }),
        )),
    }
}
