// crates/basekit-core/src/password.rs
// ============================================================================
// Module: Password Hashing
// Description: Salted password digests and session token generation.
// Purpose: Store credentials without plaintext and issue unguessable tokens.
// Dependencies: hex, rand, sha2, subtle
// ============================================================================

//! ## Overview
//! Hashed passwords are stored as `sha256$<salt hex>$<digest hex>`, where the
//! digest covers the salt followed by the password bytes. Verification parses
//! the stored form and compares digests in constant time; any malformed
//! stored value fails verification. Session tokens are random bytes rendered
//! as lowercase hex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Algorithm tag leading every stored hash.
pub const PASSWORD_HASH_ALGORITHM: &str = "sha256";
/// Salt length in bytes.
const SALT_BYTES: usize = 8;
/// Session token length in bytes.
const SESSION_TOKEN_BYTES: usize = 16;
/// Separator between stored hash fields.
const HASH_SEPARATOR: char = '$';

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes `password` with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut salt = [0_u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let digest = salted_digest(&salt, password);
    format!(
        "{PASSWORD_HASH_ALGORITHM}{HASH_SEPARATOR}{}{HASH_SEPARATOR}{}",
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// Returns true when `password` matches the stored `hashed` value.
#[must_use]
pub fn verify_password(password: &str, hashed: &str) -> bool {
    let mut parts = hashed.split(HASH_SEPARATOR);
    let (Some(algorithm), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if algorithm != PASSWORD_HASH_ALGORITHM {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    let actual = salted_digest(&salt, password);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

/// Generates a random session token.
#[must_use]
pub fn generate_session_token() -> String {
    let mut bytes = [0_u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digests the salt followed by the password.
fn salted_digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
