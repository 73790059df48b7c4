// crates/basekit-core/src/redaction.rs
// ============================================================================
// Module: Log Redaction
// Description: Helpers that strip secrets from logged payloads.
// Purpose: Keep passwords and session tokens out of audit output.
// Dependencies: hex, serde_json, sha2
// ============================================================================

//! ## Overview
//! Request bodies are logged when a call fails. Before logging, every field
//! named `password` (at any depth, including inside arrays) is replaced with
//! [`MASK`]. Session tokens are logged as SHA-256 fingerprints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Field name whose values are masked.
pub const PASSWORD_FIELD: &str = "password";
/// Replacement text for masked values.
pub const MASK: &str = "****";

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a copy of `value` with every `password` field masked.
#[must_use]
pub fn mask_passwords(value: &Value) -> Value {
    let mut masked = value.clone();
    mask_in_place(&mut masked);
    masked
}

/// Masks `password` fields in place.
pub fn mask_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if key == PASSWORD_FIELD {
                    *entry = Value::String(MASK.to_string());
                } else {
                    mask_in_place(entry);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_in_place),
        _ => {}
    }
}

/// Returns the hex SHA-256 fingerprint of a secret.
#[must_use]
pub fn fingerprint(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
