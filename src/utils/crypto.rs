use base64::{
    engine::general_purpose::{STANDARD as Base64, URL_SAFE_NO_PAD as Base64Url},
    Engine as _,
};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 password hasher. The iteration count is stored in the
/// encoded hash, so changing it only affects newly hashed passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Encodes as `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = derive_key(password.as_bytes(), &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            Base64.encode(salt),
            Base64.encode(key)
        )
    }

    pub fn verify(&self, password: &str, encoded: &str) -> AppResult<bool> {
        let mut parts = encoded.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(AppError::other("stored password hash is malformed"));
        };

        if scheme != SCHEME {
            return Err(AppError::other("unsupported password hash scheme"));
        }

        let iterations: u32 = iterations
            .parse()
            .map_err(|_| AppError::other("stored password hash has an invalid iteration count"))?;
        let salt = Base64
            .decode(salt.as_bytes())
            .map_err(|_| AppError::other("stored password salt is corrupt"))?;
        let expected = Base64
            .decode(expected.as_bytes())
            .map_err(|_| AppError::other("stored password hash is corrupt"))?;

        let actual = derive_key(password.as_bytes(), &salt, iterations);
        Ok(constant_time_eq(&actual, &expected))
    }
}

/// A fresh opaque bearer token, URL-safe.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    OsRng.fill_bytes(&mut bytes);
    Base64Url.encode(bytes)
}

/// Digest under which a bearer token is stored; the token itself is never persisted.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    Base64Url.encode(digest)
}

fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    key
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
