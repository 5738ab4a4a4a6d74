//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::core::auth::jwt::{
    ACCESS_TOKEN_EXPIRATION_MINUTES, DEFAULT_ISSUER, REFRESH_TOKEN_EXPIRATION_DAYS, TokenConfig,
};
use crate::core::auth::password::BCRYPT_COST;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Upper bound for `ACCESS_TOKEN_TTL_MINUTES` (one day)
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
/// Upper bound for `REFRESH_TOKEN_TTL_DAYS`
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Startup configuration errors. Both are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Secret for signing access tokens
    pub access_token_secret: String,
    /// Secret for signing refresh tokens
    pub refresh_token_secret: String,
    pub bind_addr: SocketAddr,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub token_issuer: String,
    pub bcrypt_cost: u32,
    /// Allowed CORS origin (credentials are allowed for it)
    pub cors_origin: HeaderValue,
    /// Clear the stored refresh token when logout presents it
    pub logout_revokes_refresh_token: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_token_secret =
            get("ACCESS_TOKEN_SECRET").ok_or(ConfigError::MissingVar("ACCESS_TOKEN_SECRET"))?;
        let refresh_token_secret =
            get("REFRESH_TOKEN_SECRET").ok_or(ConfigError::MissingVar("REFRESH_TOKEN_SECRET"))?;

        let mut bind_addr: SocketAddr = parse_var(
            "BIND_ADDR",
            get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        )?;
        if let Some(port) = get("PORT") {
            bind_addr.set_port(parse_var("PORT", port)?);
        }

        let access_token_ttl_minutes = match get("ACCESS_TOKEN_TTL_MINUTES") {
            Some(v) => ttl_in_range("ACCESS_TOKEN_TTL_MINUTES", v, MAX_ACCESS_TOKEN_TTL_MINUTES)?,
            None => ACCESS_TOKEN_EXPIRATION_MINUTES,
        };
        let refresh_token_ttl_days = match get("REFRESH_TOKEN_TTL_DAYS") {
            Some(v) => ttl_in_range("REFRESH_TOKEN_TTL_DAYS", v, MAX_REFRESH_TOKEN_TTL_DAYS)?,
            None => REFRESH_TOKEN_EXPIRATION_DAYS,
        };

        let bcrypt_cost: u32 = match get("BCRYPT_COST") {
            Some(v) => parse_var("BCRYPT_COST", v)?,
            None => BCRYPT_COST,
        };
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidVar {
                name: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        let cors_origin =
            HeaderValue::from_str(&cors_origin).map_err(|e| ConfigError::InvalidVar {
                name: "CORS_ORIGIN",
                reason: e.to_string(),
            })?;

        let logout_revokes_refresh_token = match get("LOGOUT_REVOKES_REFRESH_TOKEN") {
            Some(v) => parse_bool("LOGOUT_REVOKES_REFRESH_TOKEN", &v)?,
            None => false,
        };

        Ok(Self {
            access_token_secret,
            refresh_token_secret,
            bind_addr,
            access_token_ttl_minutes,
            refresh_token_ttl_days,
            token_issuer: get("TOKEN_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            bcrypt_cost,
            cors_origin,
            logout_revokes_refresh_token,
        })
    }

    /// Token settings for the codec
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(&self.access_token_secret, &self.refresh_token_secret)
            .access_token_expiration(self.access_token_ttl_minutes)
            .refresh_token_expiration(self.refresh_token_ttl_days)
            .issuer(&self.token_issuer)
    }
}

// Secrets stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("token_issuer", &self.token_issuer)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cors_origin", &self.cors_origin)
            .field(
                "logout_revokes_refresh_token",
                &self.logout_revokes_refresh_token,
            )
            .finish()
    }
}

fn parse_var<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
        name,
        reason: e.to_string(),
    })
}

fn ttl_in_range(name: &'static str, value: String, max: i64) -> Result<i64, ConfigError> {
    let ttl: i64 = parse_var(name, value)?;
    if (1..=max).contains(&ttl) {
        Ok(ttl)
    } else {
        Err(ConfigError::InvalidVar {
            name,
            reason: format!("must be between 1 and {}", max),
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidVar {
            name,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}
