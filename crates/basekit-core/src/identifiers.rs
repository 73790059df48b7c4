// crates/basekit-core/src/identifiers.rs
// ============================================================================
// Module: Storage Identifiers
// Description: Document identifier type used by the storage layer.
// Purpose: Parse, render, and generate 12-byte document identifiers.
// Dependencies: hex, serde, serde_json
// ============================================================================

//! ## Overview
//! Document identifiers are 12 bytes rendered as 24 hexadecimal characters.
//! Clients send them as plain strings; the storage layer's native JSON form is
//! `{"$oid": "<hex>"}`. [`ObjectId`] accepts both.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of bytes in an identifier.
pub const OBJECT_ID_BYTES: usize = 12;
/// Number of hex characters in a rendered identifier.
pub const OBJECT_ID_HEX_LEN: usize = OBJECT_ID_BYTES * 2;
/// Key of the native identifier wrapper object.
pub const NATIVE_ID_KEY: &str = "$oid";

/// Per-process counter mixed into generated identifiers.
static GENERATION_COUNTER: AtomicU32 = AtomicU32::new(0);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parsing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Text is not 24 hexadecimal characters.
    #[error("invalid object id: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Object Id
// ============================================================================

/// 12-byte document identifier.
///
/// # Invariants
/// - Always renders as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_BYTES]);

impl ObjectId {
    /// Creates an identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; OBJECT_ID_BYTES] {
        self.0
    }

    /// Parses a 24 character hex string (either case).
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Malformed`] when the text is not a valid id.
    pub fn parse(text: &str) -> Result<Self, IdentifierError> {
        if !is_object_id_text(text) {
            return Err(IdentifierError::Malformed(text.to_string()));
        }
        let mut bytes = [0_u8; OBJECT_ID_BYTES];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|_| IdentifierError::Malformed(text.to_string()))?;
        Ok(Self(bytes))
    }

    /// Generates a fresh identifier from the clock, process id, and a counter.
    #[must_use]
    pub fn generate() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let seconds = u32::try_from(seconds & u64::from(u32::MAX)).unwrap_or_default();
        let process = std::process::id();
        let counter = GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0_u8; OBJECT_ID_BYTES];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..8].copy_from_slice(&process.to_be_bytes());
        bytes[8..12].copy_from_slice(&counter.to_be_bytes());
        Self(bytes)
    }

    /// Returns the lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the storage layer's native JSON form.
    #[must_use]
    pub fn to_native(&self) -> Value {
        json!({ NATIVE_ID_KEY: self.to_hex() })
    }

    /// Reads an identifier from a hex string or the native JSON form.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Self::parse(text).ok(),
            Value::Object(map) if map.len() == 1 => {
                map.get(NATIVE_ID_KEY).and_then(Value::as_str).and_then(|text| Self::parse(text).ok())
            }
            _ => None,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("expected 24 hex character object id"))
    }
}

/// Returns true when the text is exactly 24 hexadecimal characters.
#[must_use]
pub fn is_object_id_text(text: &str) -> bool {
    text.len() == OBJECT_ID_HEX_LEN && text.bytes().all(|byte| byte.is_ascii_hexdigit())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
