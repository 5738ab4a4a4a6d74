//! Repositories for the session core
//!
//! Repositories encapsulate data access and give the auth service a keyed,
//! storage-agnostic API.

pub mod user;

pub use user::{InMemoryUserRepository, RotateOutcome, UserRepository, UserRepositoryError};
