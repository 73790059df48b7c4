// crates/basekit-contract/src/coercion.rs
// ============================================================================
// Module: Identifier Coercion
// Description: Schema-derived plans that rewrite identifier fields.
// Purpose: Convert string identifiers to the storage layer's native form.
// Dependencies: basekit-core, serde_json
// ============================================================================

//! ## Overview
//! An [`IdCoercionPlan`] is derived once per method from its input schema. It
//! records where `objectId` and `objectIdOrEmpty` fields live (through nested
//! objects, arrays, and entity references) and rewrites those strings into
//! `{"$oid": "<hex>"}`. Recursive entities are followed once per path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use basekit_core::ApiError;
use basekit_core::ObjectId;
use serde_json::Value;
use serde_json::json;

use crate::strictness::FORMAT_OBJECT_ID;
use crate::strictness::FORMAT_OBJECT_ID_OR_EMPTY;
use crate::validator::EntityLookup;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Location of identifier fields inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdNode {
    /// Identifier string.
    Id {
        /// Whether the empty string is passed through.
        allow_empty: bool,
    },
    /// Object with identifier-bearing properties.
    Object(BTreeMap<String, IdNode>),
    /// Array whose items carry identifiers.
    Array(Box<IdNode>),
}

/// Per-method identifier rewrite plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdCoercionPlan {
    /// Root node; `None` when the schema holds no identifiers.
    root: Option<IdNode>,
}

impl IdCoercionPlan {
    /// Derives a plan from an input schema.
    #[must_use]
    pub fn from_schema(schema: &Value, entities: &dyn EntityLookup) -> Self {
        let mut visiting = Vec::new();
        Self {
            root: plan_node(schema, entities, &mut visiting),
        }
    }

    /// Returns true when the plan rewrites nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Rewrites identifier fields in place.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` naming the first malformed identifier field.
    pub fn apply(&self, body: &mut Value) -> Result<(), ApiError> {
        match &self.root {
            Some(node) => apply_node(node, body, ""),
            None => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the plan node for one schema node.
fn plan_node(schema: &Value, entities: &dyn EntityLookup, visiting: &mut Vec<String>) -> Option<IdNode> {
    let map = schema.as_object()?;
    if let Some(target) = map.get("$ref").and_then(Value::as_str)
        && !target.starts_with('#')
    {
        if visiting.iter().any(|id| id == target) {
            return None;
        }
        let entity = entities.entity(target)?;
        visiting.push(target.to_string());
        let node = plan_node(entity, entities, visiting);
        visiting.pop();
        return node;
    }
    match map.get("format").and_then(Value::as_str) {
        Some(FORMAT_OBJECT_ID) => {
            return Some(IdNode::Id {
                allow_empty: false,
            });
        }
        Some(FORMAT_OBJECT_ID_OR_EMPTY) => {
            return Some(IdNode::Id {
                allow_empty: true,
            });
        }
        _ => {}
    }
    if let Some(properties) = map.get("properties").and_then(Value::as_object) {
        let children: BTreeMap<String, IdNode> = properties
            .iter()
            .filter_map(|(name, child)| plan_node(child, entities, visiting).map(|node| (name.clone(), node)))
            .collect();
        return (!children.is_empty()).then_some(IdNode::Object(children));
    }
    map.get("items").and_then(|items| plan_node(items, entities, visiting)).map(|node| IdNode::Array(Box::new(node)))
}

/// Applies one plan node to a value.
fn apply_node(node: &IdNode, value: &mut Value, field: &str) -> Result<(), ApiError> {
    match node {
        IdNode::Id {
            allow_empty,
        } => {
            let Value::String(text) = value else {
                return Ok(());
            };
            if text.is_empty() && *allow_empty {
                return Ok(());
            }
            let id = ObjectId::parse(text).map_err(|_| {
                let field_name = if field.is_empty() { "<body>" } else { field };
                ApiError::invalid_parameter(format!("Invalid id: \"{text}\" in field '{field_name}'."))
                    .with_context(json!({ "field": field_name, "value": text }))
            })?;
            *value = id.to_native();
            Ok(())
        }
        IdNode::Object(children) => {
            let Value::Object(map) = value else {
                return Ok(());
            };
            for (name, child) in children {
                if let Some(entry) = map.get_mut(name) {
                    let path = if field.is_empty() { name.clone() } else { format!("{field}.{name}") };
                    apply_node(child, entry, &path)?;
                }
            }
            Ok(())
        }
        IdNode::Array(item) => {
            let Value::Array(items) = value else {
                return Ok(());
            };
            for (index, entry) in items.iter_mut().enumerate() {
                apply_node(item, entry, &format!("{field}[{index}]"))?;
            }
            Ok(())
        }
    }
}
