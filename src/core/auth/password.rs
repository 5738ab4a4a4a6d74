//! Password hashing and verification
//!
//! The auth service treats hashing as an opaque one-way function behind
//! [`CredentialVerifier`]. The default implementation uses bcrypt.

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const BCRYPT_COST: u32 = 12;

/// Credential hashing errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Stored password hash is unreadable: {0}")]
    CorruptHash(String),
}

/// Checks plaintext passwords against stored one-way hashes
pub trait CredentialVerifier: Send + Sync {
    /// Hash a password with a fresh salt
    fn hash_password(&self, plain: &str) -> Result<String, CredentialError>;

    /// Check a password against a hash produced by `hash_password`
    fn verify_password(&self, plain: &str, hash: &str) -> Result<bool, CredentialError>;
}

/// bcrypt-backed verifier
#[derive(Debug, Clone, Copy)]
pub struct BcryptVerifier {
    cost: u32,
}

impl BcryptVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptVerifier {
    fn default() -> Self {
        Self::new(BCRYPT_COST)
    }
}

impl CredentialVerifier for BcryptVerifier {
    fn hash_password(&self, plain: &str) -> Result<String, CredentialError> {
        bcrypt::hash(plain, self.cost).map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    fn verify_password(&self, plain: &str, hash: &str) -> Result<bool, CredentialError> {
        bcrypt::verify(plain, hash).map_err(|e| CredentialError::CorruptHash(e.to_string()))
    }
}
