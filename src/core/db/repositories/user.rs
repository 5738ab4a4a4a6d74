//! User repository
//!
//! Keyed storage of user records. The auth service only talks to the
//! [`UserRepository`] trait; [`InMemoryUserRepository`] is the default backend,
//! a map keyed by id with a secondary email index.
//!
//! Refresh tokens are never stored raw. The record keeps a SHA-256 digest of
//! the current token, see [`hash_token`].

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::try_result::TryResult;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::db::models::User;

/// How many times a contended record lock is retried before giving up
const LOCK_ATTEMPTS: usize = 64;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    /// The record is locked by a concurrent update; safe to retry
    #[error("User record is busy")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result of a compare-and-swap on the stored refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The expected digest matched and was replaced
    Rotated,
    /// The stored digest differs (superseded or cleared)
    Stale,
    /// No user with that id
    Missing,
}

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Keyed storage of user records
///
/// Updates of `refresh_token_hash` must be atomic per user: login overwrites
/// it, refresh compares and swaps it.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user; fails with `EmailAlreadyExists` if the email is taken
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, UserRepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError>;

    /// Insert or replace a whole record
    async fn save(&self, user: User) -> Result<(), UserRepositoryError>;

    /// Unconditionally overwrite the stored refresh token digest
    async fn set_refresh_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
    ) -> Result<(), UserRepositoryError>;

    /// Replace the stored digest only if it currently equals `expected`
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: Option<String>,
    ) -> Result<RotateOutcome, UserRepositoryError>;

    async fn count(&self) -> Result<usize, UserRepositoryError>;
}

/// In-process user store
///
/// Lock order is always `emails` before `users`.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
}

impl InMemoryUserRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the record under its entry lock.
    ///
    /// Returns `Ok(None)` when the user does not exist and `Busy` when the
    /// lock could not be taken within `LOCK_ATTEMPTS` tries.
    async fn with_user_mut<F, T>(&self, id: Uuid, f: F) -> Result<Option<T>, UserRepositoryError>
    where
        F: FnOnce(&mut User) -> T + Send,
        T: Send,
    {
        for _ in 0..LOCK_ATTEMPTS {
            {
                match self.users.try_get_mut(&id) {
                    TryResult::Present(mut entry) => return Ok(Some(f(entry.value_mut()))),
                    TryResult::Absent => return Ok(None),
                    TryResult::Locked => {}
                }
            }
            tokio::task::yield_now().await;
        }

        tracing::warn!("Gave up waiting for lock on user {}", id);
        Err(UserRepositoryError::Busy)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, UserRepositoryError> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => Err(UserRepositoryError::EmailAlreadyExists),
            Entry::Vacant(slot) => {
                let user = User::new(email, password_hash);
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let id = match self.emails.get(email) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };

        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, mut user: User) -> Result<(), UserRepositoryError> {
        user.updated_at = Utc::now();

        let previous_email = self.users.get(&user.id).map(|entry| entry.email.clone());

        if previous_email.as_deref() != Some(user.email.as_str()) {
            match self.emails.entry(user.email.clone()) {
                Entry::Occupied(slot) if *slot.get() != user.id => {
                    return Err(UserRepositoryError::EmailAlreadyExists);
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }

            if let Some(old) = previous_email {
                self.emails.remove(&old);
            }
        }

        self.users.insert(user.id, user);
        Ok(())
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token_hash: Option<String>,
    ) -> Result<(), UserRepositoryError> {
        self.with_user_mut(id, move |user| {
            user.refresh_token_hash = token_hash;
            user.updated_at = Utc::now();
        })
        .await?
        .ok_or(UserRepositoryError::NotFound)
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: Option<String>,
    ) -> Result<RotateOutcome, UserRepositoryError> {
        let outcome = self
            .with_user_mut(id, move |user| {
                if user.refresh_token_hash.as_deref() != Some(expected) {
                    return RotateOutcome::Stale;
                }
                user.refresh_token_hash = replacement;
                user.updated_at = Utc::now();
                RotateOutcome::Rotated
            })
            .await?;

        Ok(outcome.unwrap_or(RotateOutcome::Missing))
    }

    async fn count(&self) -> Result<usize, UserRepositoryError> {
        Ok(self.users.len())
    }
}
