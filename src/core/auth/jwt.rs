//! JWT token codec
//!
//! Signs and verifies compact HS256 tokens carrying a subject id, a token class
//! and an expiry. Access and refresh tokens use distinct secrets, so one class
//! can never be replayed as the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default access token expiration time (15 minutes)
pub const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Default refresh token expiration time (7 days)
pub const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// Default `iss` claim
pub const DEFAULT_ISSUER: &str = "session-auth";

/// Token codec configuration
#[derive(Clone)]
pub struct TokenConfig {
    /// Secret for signing access tokens
    pub access_secret: String,
    /// Secret for signing refresh tokens
    pub refresh_secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
    /// Token issuer
    pub issuer: String,
}

impl TokenConfig {
    /// Create a new configuration with default lifetimes
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_expiration_minutes: ACCESS_TOKEN_EXPIRATION_MINUTES,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Set access token expiration
    pub fn access_token_expiration(mut self, minutes: i64) -> Self {
        self.access_token_expiration_minutes = minutes;
        self
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// Token verification and signing errors
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Wrong token class")]
    WrongClass,

    #[error("Malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Token class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenClass::Access => write!(f, "access"),
            TokenClass::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Token class (access or refresh)
    pub token_type: TokenClass,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID, unique per issued token
    pub jti: String,
}

impl Claims {
    /// Get the subject as a UUID
    pub fn subject_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

#[derive(Clone)]
struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl ClassKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
}

impl TokenCodec {
    /// Create a new codec
    pub fn new(config: TokenConfig) -> Self {
        if config.access_secret == config.refresh_secret {
            tracing::warn!("Access and refresh tokens share a signing secret");
        }

        Self {
            access: ClassKeys::from_secret(&config.access_secret),
            refresh: ClassKeys::from_secret(&config.refresh_secret),
            // Out-of-range lifetimes saturate; `issue` then rejects them
            access_ttl: Duration::try_minutes(config.access_token_expiration_minutes)
                .unwrap_or(Duration::MAX),
            refresh_ttl: Duration::try_days(config.refresh_token_expiration_days)
                .unwrap_or(Duration::MAX),
            issuer: config.issuer,
        }
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access_ttl,
            TokenClass::Refresh => self.refresh_ttl,
        }
    }

    /// Issue a signed token, returning it with its expiry (Unix timestamp)
    pub fn issue(&self, subject_id: Uuid, class: TokenClass) -> Result<(String, i64), TokenError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(self.ttl(class))
            .ok_or_else(|| TokenError::Encoding(format!("{} token expiry out of range", class)))?;

        let claims = Claims {
            sub: subject_id.to_string(),
            token_type: class,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys(class).encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok((token, exp.timestamp()))
    }

    /// Verify a token of the expected class and decode its claims
    pub fn decode(&self, token: &str, expected: TokenClass) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.keys(expected).decoding, &validation)?;

        if token_data.claims.token_type != expected {
            return Err(TokenError::WrongClass);
        }

        Ok(token_data.claims)
    }

    /// Verify a token of the expected class and return its subject id
    pub fn verify(&self, token: &str, expected: TokenClass) -> Result<Uuid, TokenError> {
        self.decode(token, expected)?.subject_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &str = "test_access_secret_for_testing_only!";
    const REFRESH_SECRET: &str = "test_refresh_secret_for_testing_only";

    fn create_test_codec() -> TokenCodec {
        TokenCodec::new(TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET))
    }

    // ========================================================================
    // TokenConfig Tests
    // ========================================================================

    #[test]
    fn test_token_config_new() {
        let config = TokenConfig::new("a", "r");

        assert_eq!(config.access_secret, "a");
        assert_eq!(config.refresh_secret, "r");
        assert_eq!(
            config.access_token_expiration_minutes,
            ACCESS_TOKEN_EXPIRATION_MINUTES
        );
        assert_eq!(
            config.refresh_token_expiration_days,
            REFRESH_TOKEN_EXPIRATION_DAYS
        );
        assert_eq!(config.issuer, DEFAULT_ISSUER);
    }

    #[test]
    fn test_token_config_builder() {
        let config = TokenConfig::new("a", "r")
            .access_token_expiration(30)
            .refresh_token_expiration(14)
            .issuer("my_app");

        assert_eq!(config.access_token_expiration_minutes, 30);
        assert_eq!(config.refresh_token_expiration_days, 14);
        assert_eq!(config.issuer, "my_app");
    }

    // ========================================================================
    // Token Class Tests
    // ========================================================================

    #[test]
    fn test_token_class_display() {
        assert_eq!(TokenClass::Access.to_string(), "access");
        assert_eq!(TokenClass::Refresh.to_string(), "refresh");
    }

    #[test]
    fn test_token_class_serialization() {
        assert_eq!(
            serde_json::to_string(&TokenClass::Access).unwrap(),
            r#""access""#
        );
        let refresh: TokenClass = serde_json::from_str(r#""refresh""#).unwrap();
        assert_eq!(refresh, TokenClass::Refresh);
    }

    // ========================================================================
    // Issue / Verify Tests
    // ========================================================================

    #[test]
    fn test_issue_and_verify_access_token() {
        let codec = create_test_codec();
        let user_id = Uuid::new_v4();

        let (token, exp) = codec.issue(user_id, TokenClass::Access).unwrap();

        assert!(!token.is_empty());
        assert!(exp > Utc::now().timestamp());
        assert_eq!(codec.verify(&token, TokenClass::Access).unwrap(), user_id);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let codec = create_test_codec();
        let user_id = Uuid::new_v4();

        let (token, _) = codec.issue(user_id, TokenClass::Refresh).unwrap();
        let claims = codec.decode(&token, TokenClass::Refresh).unwrap();

        assert_eq!(claims.subject_id().unwrap(), user_id);
        assert_eq!(claims.token_type, TokenClass::Refresh);
        assert_eq!(claims.iss, DEFAULT_ISSUER);
    }

    #[test]
    fn test_refresh_outlives_access() {
        let codec = create_test_codec();
        let user_id = Uuid::new_v4();

        let (_, access_exp) = codec.issue(user_id, TokenClass::Access).unwrap();
        let (_, refresh_exp) = codec.issue(user_id, TokenClass::Refresh).unwrap();

        assert!(refresh_exp > access_exp);
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let codec = create_test_codec();
        let user_id = Uuid::new_v4();

        let (t1, _) = codec.issue(user_id, TokenClass::Refresh).unwrap();
        let (t2, _) = codec.issue(user_id, TokenClass::Refresh).unwrap();

        assert_ne!(t1, t2);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let codec = create_test_codec();
        let (token, _) = codec.issue(Uuid::new_v4(), TokenClass::Refresh).unwrap();

        // Distinct secrets: the signature check fails first
        let result = codec.verify(&token, TokenClass::Access);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let codec = create_test_codec();
        let (token, _) = codec.issue(Uuid::new_v4(), TokenClass::Access).unwrap();

        let result = codec.verify(&token, TokenClass::Refresh);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_class_with_shared_secret() {
        let codec = TokenCodec::new(TokenConfig::new("shared", "shared"));
        let (token, _) = codec.issue(Uuid::new_v4(), TokenClass::Refresh).unwrap();

        let result = codec.verify(&token, TokenClass::Access);
        assert!(matches!(result, Err(TokenError::WrongClass)));
    }

    #[test]
    fn test_wrong_secret() {
        let codec1 = TokenCodec::new(TokenConfig::new("secret_one", "r1"));
        let codec2 = TokenCodec::new(TokenConfig::new("secret_two", "r2"));

        let (token, _) = codec1.issue(Uuid::new_v4(), TokenClass::Access).unwrap();

        let result = codec2.verify(&token, TokenClass::Access);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_issuer() {
        let codec1 = TokenCodec::new(TokenConfig::new("a", "r").issuer("one"));
        let codec2 = TokenCodec::new(TokenConfig::new("a", "r").issuer("two"));

        let (token, _) = codec1.issue(Uuid::new_v4(), TokenClass::Access).unwrap();

        let result = codec2.verify(&token, TokenClass::Access);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token() {
        let config = TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET).access_token_expiration(-1);
        let codec = TokenCodec::new(config);

        let (token, _) = codec.issue(Uuid::new_v4(), TokenClass::Access).unwrap();

        let result = codec.verify(&token, TokenClass::Access);
        assert!(
            matches!(result, Err(TokenError::Expired)),
            "Expected Expired error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_out_of_range_lifetime_fails_to_issue() {
        // Too large for TimeDelta at all, and too large to add to now
        for days in [9_000_000_000_000, 1_000_000_000] {
            let codec = TokenCodec::new(
                TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET).refresh_token_expiration(days),
            );

            let result = codec.issue(Uuid::new_v4(), TokenClass::Refresh);
            assert!(matches!(result, Err(TokenError::Encoding(_))));

            // The other class is unaffected
            assert!(codec.issue(Uuid::new_v4(), TokenClass::Access).is_ok());
        }
    }

    #[test]
    fn test_malformed_input_is_typed_failure() {
        let codec = create_test_codec();

        for input in ["", "garbage", "invalid.token.here", "a.b", "...."] {
            let result = codec.verify(input, TokenClass::Access);
            assert!(
                matches!(result, Err(TokenError::Malformed)),
                "input {input:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_tampered_token_fails_signature() {
        let codec = create_test_codec();
        let (token, _) = codec.issue(Uuid::new_v4(), TokenClass::Access).unwrap();
        let (other, _) = codec.issue(Uuid::new_v4(), TokenClass::Access).unwrap();

        // Graft another token's payload onto this token's signature
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = other.split('.').nth(1).unwrap();
        let forged = parts.join(".");

        let result = codec.verify(&forged, TokenClass::Access);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    // ========================================================================
    // Error Tests
    // ========================================================================

    #[test]
    fn test_token_error_display() {
        assert_eq!(format!("{}", TokenError::Expired), "Token expired");
        assert_eq!(
            format!("{}", TokenError::InvalidSignature),
            "Invalid token signature"
        );
        assert_eq!(format!("{}", TokenError::WrongClass), "Wrong token class");
        assert_eq!(format!("{}", TokenError::Malformed), "Malformed token");
    }
}
