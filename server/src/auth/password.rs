//! bcrypt password hashing.

use bcrypt::BcryptError;

use crate::error::AppError;

/// bcrypt reads at most this many password bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashes and verifies passwords with bcrypt at a fixed work factor.
/// Every hash carries its own random salt.
#[derive(Debug, Clone, Copy)]
pub struct CredentialStore {
    cost: u32,
}

impl CredentialStore {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// One-way hash of `password`. Passwords longer than
    /// `MAX_PASSWORD_BYTES` are refused rather than silently truncated.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::non_truncating_hash(password, self.cost).map_err(|e| match e {
            BcryptError::Truncation(len) => AppError::BadRequest(format!(
                "Password is {} bytes; at most {} are allowed",
                len, MAX_PASSWORD_BYTES
            )),
            e => AppError::Internal(format!("Password hashing failed: {}", e)),
        })
    }

    /// True iff `password` matches `hash`. A malformed hash or an
    /// over-long password is a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::non_truncating_verify(password, hash) {
            Ok(matches) => matches,
            Err(BcryptError::Truncation(_)) => false,
            Err(e) => {
                tracing::warn!("Stored password hash could not be parsed: {}", e);
                false
            }
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
