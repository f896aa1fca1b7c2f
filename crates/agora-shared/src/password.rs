use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::auth::PasswordHasher;
use crate::error::AuthError;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Argon2id hasher. Production cost: 3 iterations, 64 MiB, 2 lanes.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        // 65536 KiB / 3 passes / 2 lanes are all inside argon2's accepted bounds.
        Self::with_cost(65_536, 3, 2).unwrap_or_else(|_| Self {
            params: Params::default(),
        })
    }

    /// Build a hasher with explicit cost parameters (memory in KiB).
    pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, AuthError> {
        let params = Params::new(memory_kib, iterations, lanes, Some(HASH_LEN))
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> Result<(), AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .map_err(|e| match e {
                argon2::password_hash::Error::Password => AuthError::Mismatch,
                other => AuthError::Hashing(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Hasher {
        Argon2Hasher::with_cost(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_verify_roundtrip() {
        let hasher = cheap();
        let hash = hasher.hash("secret1!").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(&hash, "secret1!").is_ok());
    }

    #[test]
    fn test_wrong_password_is_mismatch() {
        let hasher = cheap();
        let hash = hasher.hash("secret1!").unwrap();

        assert_eq!(hasher.verify(&hash, "secret2!"), Err(AuthError::Mismatch));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = cheap();
        assert_ne!(hasher.hash("secret1!").unwrap(), hasher.hash("secret1!").unwrap());
    }

    #[test]
    fn test_garbage_hash_rejected() {
        let hasher = cheap();
        assert!(matches!(
            hasher.verify("not-a-hash", "secret1!"),
            Err(AuthError::Hashing(_))
        ));
    }
}
