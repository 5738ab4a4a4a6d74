//! Token pair issuance
//!
//! Builds the access + refresh pair handed out at login and on every rotation.
//! Pure: no storage access.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::jwt::{TokenClass, TokenCodec, TokenError};

/// Token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

/// Issues access/refresh token pairs
#[derive(Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    /// Issue a fresh pair for `subject_id`
    pub fn issue_pair(&self, subject_id: Uuid) -> Result<TokenPair, TokenError> {
        let (access_token, access_expires_at) = self.codec.issue(subject_id, TokenClass::Access)?;
        let (refresh_token, refresh_expires_at) =
            self.codec.issue(subject_id, TokenClass::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }
}
