//! Authentication module
//!
//! This module provides authentication functionality including:
//! - JWT access and refresh token issuance and validation
//! - User registration and password login
//! - Refresh token rotation with a single live token per user
//! - REST API endpoints for auth operations

pub mod api;
pub mod gate;
pub mod issuer;
pub mod jwt;
pub mod password;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use gate::{AuthGate, AuthenticatedUser};
pub use issuer::{TokenIssuer, TokenPair};
pub use jwt::{Claims, TokenClass, TokenCodec, TokenConfig, TokenError};
pub use password::{BcryptVerifier, CredentialError, CredentialVerifier};
pub use service::{
    AuthError, LoginRequest, LoginSession, RefreshOutcome, RegisterRequest, SessionService,
};
