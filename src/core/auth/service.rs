//! Session rotation service
//!
//! Provides business logic for registration, login, refresh token rotation and
//! logout. Coordinates between the user repository, the credential verifier
//! and the token issuer.
//!
//! A user holds at most one live refresh token. Login overwrites it, refresh
//! swaps it for a new one, and any token that no longer matches the stored
//! digest yields "no session" instead of an error.

use std::sync::Arc;

use crate::core::auth::issuer::{TokenIssuer, TokenPair};
use crate::core::auth::jwt::{TokenClass, TokenCodec, TokenError};
use crate::core::auth::password::{CredentialError, CredentialVerifier};
use crate::core::db::models::UserResponse;
use crate::core::db::repositories::user::hash_token;
use crate::core::db::repositories::{RotateOutcome, UserRepository, UserRepositoryError};

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User doesn't exist")]
    UserNotFound,

    #[error("Incorrect password")]
    InvalidCredentials,

    #[error("You need to login")]
    Unauthorized,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must not be empty")]
    InvalidPassword,

    #[error("Invalid request body")]
    BadRequest,

    #[error("Service busy, retry the request")]
    Busy,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Stable error kind reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::UserAlreadyExists => "UserAlreadyExists",
            AuthError::UserNotFound => "UserNotFound",
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::Unauthorized => "Unauthorized",
            AuthError::InvalidEmail => "InvalidEmail",
            AuthError::InvalidPassword => "InvalidPassword",
            AuthError::BadRequest => "BadRequest",
            AuthError::Busy => "Busy",
            AuthError::InternalError(_) => "Internal",
        }
    }
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::UserNotFound,
            UserRepositoryError::EmailAlreadyExists => AuthError::UserAlreadyExists,
            UserRepositoryError::Busy => AuthError::Busy,
            UserRepositoryError::Storage(_) => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(_) => AuthError::InternalError(err.to_string()),
            TokenError::InvalidSignature
            | TokenError::Expired
            | TokenError::WrongClass
            | TokenError::Malformed => AuthError::Unauthorized,
        }
    }
}

/// Registration request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A successful login: the user and a fresh token pair
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginSession {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Result of presenting a refresh token
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// The token was current; here is the replacement pair
    Rotated(TokenPair),
    /// No usable session. Deliberately carries no reason.
    NoSession,
}

impl RefreshOutcome {
    /// The new access token, or an empty string when there is no session
    pub fn access_token(&self) -> &str {
        match self {
            RefreshOutcome::Rotated(tokens) => &tokens.access_token,
            RefreshOutcome::NoSession => "",
        }
    }
}

/// Login, refresh rotation and logout
#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserRepository>,
    verifier: Arc<dyn CredentialVerifier>,
    issuer: TokenIssuer,
    revoke_on_logout: bool,
}

impl SessionService {
    /// Create a new session service
    pub fn new(
        users: Arc<dyn UserRepository>,
        verifier: Arc<dyn CredentialVerifier>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            users,
            verifier,
            issuer,
            revoke_on_logout: false,
        }
    }

    /// Clear the stored refresh token when a logout presents it
    pub fn with_logout_revocation(mut self, enabled: bool) -> Self {
        self.revoke_on_logout = enabled;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        self.issuer.codec()
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), AuthError> {
        let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        // Domain needs at least one dot and no empty labels
        if !domain.contains('.') || domain.split('.').any(|label| label.is_empty()) {
            return Err(AuthError::InvalidEmail);
        }

        Ok(())
    }

    // bcrypt is CPU-bound, keep it off the async workers

    async fn hash_password(&self, plain: String) -> Result<String, AuthError> {
        let verifier = Arc::clone(&self.verifier);
        let hash = tokio::task::spawn_blocking(move || verifier.hash_password(&plain))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))??;
        Ok(hash)
    }

    async fn verify_password(&self, plain: String, hash: String) -> Result<bool, AuthError> {
        let verifier = Arc::clone(&self.verifier);
        let valid = tokio::task::spawn_blocking(move || verifier.verify_password(&plain, &hash))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))??;
        Ok(valid)
    }

    /// Register a new user
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        Self::validate_email(&request.email)?;
        if request.password.is_empty() {
            return Err(AuthError::InvalidPassword);
        }

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = self.hash_password(request.password).await?;

        // The repository re-checks uniqueness atomically
        let user = self.users.create(&request.email, &password_hash).await?;

        tracing::info!(user_id = %user.id, "User registered: {}", user.email);

        Ok(user.into())
    }

    /// Login an existing user, replacing any previous session
    pub async fn login(&self, request: LoginRequest) -> Result<LoginSession, AuthError> {
        let user = self
            .users
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .verify_password(request.password, user.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issuer.issue_pair(user.id)?;

        self.users
            .set_refresh_token(user.id, Some(hash_token(&tokens.refresh_token)))
            .await?;

        tracing::info!(user_id = %user.id, "User logged in: {}", user.email);

        Ok(LoginSession {
            user: user.into(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the refresh token.
    ///
    /// Every rejection is reported as [`RefreshOutcome::NoSession`]. Errors are
    /// reserved for transient contention and internal failures.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<RefreshOutcome, AuthError> {
        let Some(token) = presented.filter(|t| !t.is_empty()) else {
            tracing::debug!("Refresh without token");
            return Ok(RefreshOutcome::NoSession);
        };

        let user_id = match self.codec().verify(token, TokenClass::Refresh) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(reason = %e, "Refresh token rejected");
                return Ok(RefreshOutcome::NoSession);
            }
        };

        let Some(user) = self.users.find_by_id(user_id).await? else {
            tracing::debug!(%user_id, "Refresh token for unknown user");
            return Ok(RefreshOutcome::NoSession);
        };

        let presented_hash = hash_token(token);
        if user.refresh_token_hash.as_deref() != Some(presented_hash.as_str()) {
            tracing::warn!(%user_id, "Superseded refresh token presented");
            return Ok(RefreshOutcome::NoSession);
        }

        let tokens = self.issuer.issue_pair(user.id)?;

        let outcome = self
            .users
            .rotate_refresh_token(
                user.id,
                &presented_hash,
                Some(hash_token(&tokens.refresh_token)),
            )
            .await?;

        match outcome {
            RotateOutcome::Rotated => {
                tracing::info!(%user_id, "Refresh token rotated");
                Ok(RefreshOutcome::Rotated(tokens))
            }
            RotateOutcome::Stale | RotateOutcome::Missing => {
                tracing::warn!(%user_id, "Refresh token superseded by a concurrent rotation");
                Ok(RefreshOutcome::NoSession)
            }
        }
    }

    /// Logout. Transport-level unless logout revocation is enabled.
    ///
    /// With revocation, a presented token that is still current is cleared
    /// from the user record. Logout always succeeds.
    pub async fn logout(&self, presented: Option<&str>) {
        if !self.revoke_on_logout {
            return;
        }

        let Some(token) = presented.filter(|t| !t.is_empty()) else {
            return;
        };

        let Ok(user_id) = self.codec().verify(token, TokenClass::Refresh) else {
            return;
        };

        match self
            .users
            .rotate_refresh_token(user_id, &hash_token(token), None)
            .await
        {
            Ok(RotateOutcome::Rotated) => {
                tracing::info!(%user_id, "Refresh token revoked on logout");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(%user_id, "Logout revocation skipped: {}", e),
        }
    }
}
