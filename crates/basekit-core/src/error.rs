// crates/basekit-core/src/error.rs
// ============================================================================
// Module: API Error Taxonomy
// Description: Closed error-kind vocabulary and the API error value.
// Purpose: Classify every failure surfaced to API clients uniformly.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every failure that crosses the request pipeline is an [`ApiError`]: an
//! [`ErrorKind`] token, a human-readable message, and optional structured
//! context. Kinds serialize as their wire token (`invalid_parameter`,
//! `ssl_required`, ...). Methods may declare additional domain kinds, carried
//! as [`ErrorKind::Custom`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Status token written for successful calls.
pub const STATUS_OK: &str = "ok";

/// Error kind token reported in the response status.
///
/// # Invariants
/// - The wire token of a built-in kind never parses to [`ErrorKind::Custom`].
/// - `Custom` tokens are never `ok` and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorKind {
    /// Unexpected server-side failure.
    Internal,
    /// Request parameter unknown, missing, or invalid.
    InvalidParameter,
    /// Method requires an SSL connection.
    SslRequired,
    /// Referenced object does not exist.
    NotFound,
    /// Object being created already exists.
    AlreadyExists,
    /// Acting user is disabled.
    DisabledUser,
    /// Object is referenced and cannot be deleted or moved.
    ObjectIsUsed,
    /// Object is in use.
    ObjectInUse,
    /// Acting user lacks the right for the action.
    NoRight,
    /// Acting user is not allowed to perform the action.
    NotAllowed,
    /// Session token is unknown or expired.
    InvalidSession,
    /// Functionality is not implemented.
    NotImplemented,
    /// Method-declared domain kind.
    Custom(String),
}

impl ErrorKind {
    /// Built-in kinds in their canonical order.
    pub const BUILT_IN: [Self; 12] = [
        Self::Internal,
        Self::InvalidParameter,
        Self::SslRequired,
        Self::NotFound,
        Self::AlreadyExists,
        Self::DisabledUser,
        Self::ObjectIsUsed,
        Self::ObjectInUse,
        Self::NoRight,
        Self::NotAllowed,
        Self::InvalidSession,
        Self::NotImplemented,
    ];

    /// Parses a wire token, mapping unknown tokens to [`ErrorKind::Custom`].
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "internal" => Self::Internal,
            "invalid_parameter" => Self::InvalidParameter,
            "ssl_required" => Self::SslRequired,
            "not_found" => Self::NotFound,
            "already_exists" => Self::AlreadyExists,
            "disabled_user" => Self::DisabledUser,
            "object_is_used" => Self::ObjectIsUsed,
            "object_in_use" => Self::ObjectInUse,
            "no_right" => Self::NoRight,
            "not_allowed" => Self::NotAllowed,
            "invalid_session" => Self::InvalidSession,
            "not_implemented" => Self::NotImplemented,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Returns the wire token for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Internal => "internal",
            Self::InvalidParameter => "invalid_parameter",
            Self::SslRequired => "ssl_required",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::DisabledUser => "disabled_user",
            Self::ObjectIsUsed => "object_is_used",
            Self::ObjectInUse => "object_in_use",
            Self::NoRight => "no_right",
            Self::NotAllowed => "not_allowed",
            Self::InvalidSession => "invalid_session",
            Self::NotImplemented => "not_implemented",
            Self::Custom(token) => token,
        }
    }

    /// Returns the default human-readable message for this kind.
    #[must_use]
    pub const fn default_message(&self) -> &'static str {
        match self {
            Self::Internal => "Internal error.",
            Self::InvalidParameter => "Parameter unknown, missed or has invalid value.",
            Self::SslRequired => "SSL is required for this call.",
            Self::NotFound => "Object not found.",
            Self::AlreadyExists => "Object already exists.",
            Self::DisabledUser => "User is disabled.",
            Self::ObjectIsUsed => "Object is used and cannot be deleted or moved.",
            Self::ObjectInUse => "Object is in use.",
            Self::NoRight => "User has no right for this action.",
            Self::NotAllowed => "User not allowed to perform this action.",
            Self::InvalidSession => "Session is unknown or expired.",
            Self::NotImplemented => "This functionality not implemented.",
            Self::Custom(_) => "Unknown error.",
        }
    }

    /// Returns true when the token is acceptable as a declared error kind.
    #[must_use]
    pub fn is_valid_token(token: &str) -> bool {
        !token.is_empty()
            && token != STATUS_OK
            && token.bytes().all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_')
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrorKind {
    fn from(value: String) -> Self {
        Self::from_token(&value)
    }
}

impl From<&str> for ErrorKind {
    fn from(value: &str) -> Self {
        Self::from_token(value)
    }
}

impl From<ErrorKind> for String {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Custom(token) => token,
            other => other.as_str().to_string(),
        }
    }
}

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Failure returned by pipeline stages, processors, and method bodies.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Optional structured context for logs.
    pub context: Option<Value>,
}

impl ApiError {
    /// Creates an error with an explicit message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Creates an error carrying the kind's default message.
    #[must_use]
    pub fn from_kind(kind: ErrorKind) -> Self {
        let message = kind.default_message().to_string();
        Self::new(kind, message)
    }

    /// Attaches structured context.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an `internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Creates an `invalid_parameter` error.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    /// Creates an `ssl_required` error.
    #[must_use]
    pub fn ssl_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SslRequired, message)
    }

    /// Creates an `invalid_session` error.
    #[must_use]
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSession, message)
    }

    /// Creates a `not_found` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use super::*;

    #[test]
    fn built_in_tokens_round_trip() {
        for kind in ErrorKind::BUILT_IN {
            assert_eq!(ErrorKind::from_token(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_token_is_custom() {
        assert_eq!(ErrorKind::from_token("weak_password"), ErrorKind::Custom("weak_password".to_string()));
    }

    #[test]
    fn kind_serializes_as_token() {
        let encoded = serde_json::to_string(&ErrorKind::SslRequired).unwrap();
        assert_eq!(encoded, "\"ssl_required\"");
        let decoded: ErrorKind = serde_json::from_str("\"quota_exceeded\"").unwrap();
        assert_eq!(decoded.as_str(), "quota_exceeded");
    }

    #[test]
    fn token_validation_rejects_ok_and_uppercase() {
        assert!(ErrorKind::is_valid_token("weak_password"));
        assert!(!ErrorKind::is_valid_token("ok"));
        assert!(!ErrorKind::is_valid_token(""));
        assert!(!ErrorKind::is_valid_token("Bad"));
    }

    #[test]
    fn from_kind_uses_default_message() {
        let error = ApiError::from_kind(ErrorKind::NoRight);
        assert_eq!(error.message, "User has no right for this action.");
    }
}
