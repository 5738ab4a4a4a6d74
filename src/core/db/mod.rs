//! Storage module
//!
//! Models and repositories for user records. The default backend is an
//! in-process concurrent map; other backends implement [`UserRepository`].

pub mod models;
pub mod repositories;

pub use models::*;
pub use repositories::{
    InMemoryUserRepository, RotateOutcome, UserRepository, UserRepositoryError,
};
