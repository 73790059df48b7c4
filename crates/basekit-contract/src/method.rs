// crates/basekit-contract/src/method.rs
// ============================================================================
// Module: Method Contracts
// Description: Declared method shapes and their published snapshot form.
// Purpose: Model what callers register and what `getAPI` publishes.
// Dependencies: basekit-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Callers declare a method with a [`MethodSpec`]: input and output schemas
//! plus [`MethodInfo`] (description, declared errors, SSL requirement, sample
//! result). Once admitted, the registry publishes a [`MethodContract`] per
//! method; it is the only shape that leaves the registry, so published data
//! never aliases registry internals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::validator::SchemaError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Documentation and policy attached to a method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared error kinds mapped to messages.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    /// Whether the method requires an SSL connection.
    #[serde(default, rename = "forcedSSL", skip_serializing_if = "is_false")]
    pub forced_ssl: bool,
    /// Example result that must satisfy the output schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_result: Option<Value>,
}

/// Method declaration supplied at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Request body schema.
    pub input: Value,
    /// Result schema.
    pub output: Value,
    /// Method documentation and policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MethodInfo>,
}

impl MethodSpec {
    /// Creates a declaration from its parts.
    #[must_use]
    pub const fn new(input: Value, output: Value, info: MethodInfo) -> Self {
        Self {
            input,
            output,
            info: Some(info),
        }
    }
}

/// Published description of an admitted method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodContract {
    /// Method name.
    pub name: String,
    /// Request body schema.
    pub input: Value,
    /// Result schema.
    pub output: Value,
    /// Documentation with the augmented error map.
    pub info: MethodInfo,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Method metadata check failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// `info` is absent.
    #[error("method info is missing")]
    MissingInfo,
    /// `info.description` is absent or blank.
    #[error("method description is missing")]
    MissingDescription,
    /// The input schema is not acceptable.
    #[error("input schema is invalid: {0}")]
    InvalidInput(SchemaError),
    /// The output schema is not acceptable.
    #[error("output schema is invalid: {0}")]
    InvalidOutput(SchemaError),
    /// `info.sampleResult` is absent.
    #[error("sample result is missing")]
    MissingSampleResult,
    /// `info.sampleResult` does not satisfy the output schema.
    #[error("sample result does not match output schema: {0}")]
    SampleResultMismatch(String),
    /// A declared error kind is not a valid token.
    #[error("declared error kind is invalid: {0}")]
    InvalidErrorKind(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serde helper that omits false flags.
#[allow(clippy::trivially_copy_pass_by_ref, reason = "Serde skip helpers take references.")]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Returns true when the input schema declares a top-level `session` property.
#[must_use]
pub fn declares_session(input: &Value) -> bool {
    input.get("properties").and_then(|properties| properties.get("session")).is_some()
}
