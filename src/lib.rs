//! session-auth - Password login with rotating refresh tokens
//!
//! Issues paired short-lived access tokens and long-lived refresh tokens,
//! rotates the refresh token on every use and rejects superseded ones.

pub mod app;
pub mod core;
