// crates/basekit-contract/src/entities.rs
// ============================================================================
// Module: Entity Registry
// Description: Named reusable schema fragments referenced by `$ref`.
// Purpose: Hold entity schemas and resolve references during compilation.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Entities are reusable schema fragments identified by their `id`. Method
//! schemas and other entities refer to them with a bare `$ref: "<id>"`.
//! The registry only stores; admission checks live in
//! [`crate::registry::RegistryBuilder::register_entity`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::validator::EntityLookup;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registered entity schemas keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRegistry {
    /// Entities keyed by id.
    entities: BTreeMap<String, Value>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Returns the schema registered under `id`.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<&Value> {
        self.entities.get(id)
    }

    /// Returns every entity keyed by id.
    #[must_use]
    pub const fn all(&self) -> &BTreeMap<String, Value> {
        &self.entities
    }

    /// Stores an admitted entity.
    pub(crate) fn insert(&mut self, id: String, schema: Value) {
        self.entities.insert(id, schema);
    }
}

impl EntityLookup for EntityRegistry {
    fn entity(&self, id: &str) -> Option<&Value> {
        self.resolve(id)
    }
}

/// Entity lookup that also sees one entity pending admission.
pub(crate) struct PendingEntity<'a> {
    /// Already admitted entities.
    pub(crate) base: &'a EntityRegistry,
    /// Pending entity id.
    pub(crate) id: &'a str,
    /// Pending entity schema.
    pub(crate) schema: &'a Value,
}

impl EntityLookup for PendingEntity<'_> {
    fn entity(&self, id: &str) -> Option<&Value> {
        if id == self.id { Some(self.schema) } else { self.base.resolve(id) }
    }
}
