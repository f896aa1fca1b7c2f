//! Authentication contracts consumed by the service layer.
//!
//! The domain code only relies on these traits; the algorithms behind them
//! are swappable. Default implementations live in [`crate::password`] and
//! [`crate::session`].

use crate::error::AuthError;
use crate::types::UserId;

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing string.
    fn hash(&self, plaintext: &str) -> Result<String, AuthError>;

    /// Check `plaintext` against a stored hash. A wrong password is
    /// [`AuthError::Mismatch`].
    fn verify(&self, hash: &str, plaintext: &str) -> Result<(), AuthError>;
}

/// Opaque session tokens binding a bearer to a user id.
pub trait SessionTokens: Send + Sync {
    fn issue(&self, user_id: UserId) -> Result<String, AuthError>;

    fn resolve(&self, token: &str) -> Result<UserId, AuthError>;
}
