// crates/basekit-contract/src/catalog.rs
// ============================================================================
// Module: Error Catalog
// Description: Global map of error kinds to default messages.
// Purpose: Publish every declared error kind with a human-readable message.
// Dependencies: basekit-core
// ============================================================================

//! ## Overview
//! The catalog starts from a fixed baseline and grows as methods register.
//! The first registration of a kind wins; later ones are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use basekit_core::ErrorKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Baseline catalog entries.
const BASELINE: &[(&str, &str)] = &[
    ("internal", "Internal server error occurred."),
    ("invalid_parameter", "Parameter unknown, missed or has invalid value."),
    ("ssl_required", "SSL is required for this call."),
    ("not_found", "Item not found."),
    ("already_exists", "Item already exists."),
    ("disabled_user", "User is disabled"),
    ("object_is_used", "Object is used and cannot be deleted or moved."),
];

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Error kind to message map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCatalog {
    /// Messages keyed by kind token.
    entries: BTreeMap<String, String>,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::baseline()
    }
}

impl ErrorCatalog {
    /// Creates a catalog holding the baseline entries.
    #[must_use]
    pub fn baseline() -> Self {
        Self {
            entries: BASELINE.iter().map(|(kind, message)| ((*kind).to_string(), (*message).to_string())).collect(),
        }
    }

    /// Registers a message unless the kind is already present.
    ///
    /// Returns true when the entry was added.
    pub fn register(&mut self, kind: &ErrorKind, message: &str) -> bool {
        if self.entries.contains_key(kind.as_str()) {
            return false;
        }
        self.entries.insert(kind.as_str().to_string(), message.to_string());
        true
    }

    /// Returns the catalog message for a kind.
    #[must_use]
    pub fn message(&self, kind: &ErrorKind) -> Option<&str> {
        self.entries.get(kind.as_str()).map(String::as_str)
    }

    /// Returns the catalog message, falling back to the kind default.
    #[must_use]
    pub fn message_or_default(&self, kind: &ErrorKind) -> String {
        self.message(kind).map_or_else(|| kind.default_message().to_string(), ToString::to_string)
    }

    /// Returns every entry keyed by kind token.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
