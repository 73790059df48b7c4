// crates/basekit-contract/src/strictness.rs
// ============================================================================
// Module: Schema Strictness
// Description: Structural checks and normalization for API schemas.
// Purpose: Enforce a fail-closed schema dialect before compilation.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! API schemas are a strict JSON Schema dialect. [`check_structure`] walks a
//! schema and reports every node that breaks the configured
//! [`SchemaStrictness`] rules: unknown keywords, untyped nodes, arrays without
//! `items`, unknown formats, and unresolvable entity references.
//! [`normalize`] rewrites a checked schema for compilation: objects without
//! `additionalProperties` become closed, strings without `minLength` or
//! `format` reject the empty string, and bare entity references point into
//! `$defs`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Keywords accepted when unknown keywords are rejected.
const KNOWN_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "id",
    "$ref",
    "$defs",
    "definitions",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "readOnly",
    "writeOnly",
    "deprecated",
    "type",
    "enum",
    "const",
    "format",
    "pattern",
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "properties",
    "patternProperties",
    "additionalProperties",
    "propertyNames",
    "required",
    "minProperties",
    "maxProperties",
    "items",
    "prefixItems",
    "contains",
    "minItems",
    "maxItems",
    "uniqueItems",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
];

/// Keywords that make a node typed without an explicit `type`.
const IMPLICIT_TYPE_KEYWORDS: &[&str] = &["$ref", "enum", "const", "allOf", "anyOf", "oneOf", "not"];

/// JSON Schema primitive type names.
const TYPE_NAMES: &[&str] = &["null", "boolean", "object", "array", "number", "integer", "string"];

/// Custom format: 24 hex character identifier.
pub const FORMAT_OBJECT_ID: &str = "objectId";
/// Custom format: identifier or empty string.
pub const FORMAT_OBJECT_ID_OR_EMPTY: &str = "objectIdOrEmpty";
/// Custom format: `YYYY-MM-DD HH:MM:SS.mmm` timestamp.
pub const FORMAT_TIMESTAMP: &str = "timestamp";

/// Formats accepted in schemas.
const KNOWN_FORMATS: &[&str] = &[
    FORMAT_OBJECT_ID,
    FORMAT_OBJECT_ID_OR_EMPTY,
    FORMAT_TIMESTAMP,
    "email",
    "date-time",
    "date",
    "time",
    "uri",
    "uuid",
    "ipv4",
    "ipv6",
    "hostname",
    "regex",
];

/// Pointer prefix used for bundled entity definitions.
pub(crate) const DEFS_POINTER: &str = "#/$defs/";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Strictness flags for one validator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaStrictness {
    /// Reject schema nodes without a type.
    pub no_typeless: bool,
    /// Reject keywords outside the supported dialect.
    pub no_extra_keywords: bool,
    /// Close object schemas that omit `additionalProperties`.
    pub force_additional: bool,
    /// Reject array schemas that omit `items`.
    pub force_items: bool,
    /// Reject empty strings unless `minLength` or a `format` is declared.
    pub no_empty_strings: bool,
}

impl Default for SchemaStrictness {
    fn default() -> Self {
        Self {
            no_typeless: true,
            no_extra_keywords: true,
            force_additional: true,
            force_items: true,
            no_empty_strings: true,
        }
    }
}

/// One structural problem in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureError {
    /// JSON pointer of the offending node.
    pub path: String,
    /// Problem description.
    pub message: String,
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.message)
    }
}

// ============================================================================
// SECTION: Structure Check
// ============================================================================

/// Checks a schema against the strict dialect.
///
/// `is_known` reports whether a bare reference names a registered entity.
///
/// # Errors
///
/// Returns every [`StructureError`] found.
pub fn check_structure(
    schema: &Value,
    strictness: &SchemaStrictness,
    is_known: &dyn Fn(&str) -> bool,
) -> Result<(), Vec<StructureError>> {
    let mut errors = Vec::new();
    if schema.is_object() {
        check_node(schema, "", strictness, is_known, &mut errors);
    } else {
        errors.push(StructureError {
            path: String::new(),
            message: "root schema must be an object".to_string(),
        });
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Checks one schema node and its subschemas.
fn check_node(
    node: &Value,
    path: &str,
    strictness: &SchemaStrictness,
    is_known: &dyn Fn(&str) -> bool,
    errors: &mut Vec<StructureError>,
) {
    let map = match node {
        Value::Bool(_) => return,
        Value::Object(map) => map,
        _ => {
            push(errors, path, "schema must be an object or boolean");
            return;
        }
    };
    if strictness.no_extra_keywords {
        for key in map.keys().filter(|key| !KNOWN_KEYWORDS.contains(&key.as_str())) {
            push(errors, path, &format!("unknown keyword '{key}'"));
        }
    }
    if let Some(reference) = map.get("$ref") {
        match reference.as_str() {
            Some(target) if target.starts_with('#') || is_known(target) => {}
            Some(target) => push(errors, path, &format!("unresolvable reference '{target}'")),
            None => push(errors, path, "$ref must be a string"),
        }
    }
    let types = declared_types(map);
    if map.contains_key("type") && types.is_empty() {
        push(errors, path, "type must be a type name or list of type names");
    }
    if strictness.no_typeless
        && !map.contains_key("type")
        && !IMPLICIT_TYPE_KEYWORDS.iter().any(|keyword| map.contains_key(*keyword))
    {
        push(errors, path, "schema has no type");
    }
    if strictness.force_items && types.contains(&"array") && !map.contains_key("items") {
        push(errors, path, "array schema must declare items");
    }
    if let Some(format) = map.get("format") {
        match format.as_str() {
            Some(name) if KNOWN_FORMATS.contains(&name) => {}
            Some(name) => push(errors, path, &format!("unknown format '{name}'")),
            None => push(errors, path, "format must be a string"),
        }
    }
    for keyword in ["properties", "patternProperties", "$defs", "definitions"] {
        match map.get(keyword) {
            None => {}
            Some(Value::Object(children)) => {
                for (name, child) in children {
                    let child_path = format!("{path}/{keyword}/{}", escape_pointer(name));
                    check_node(child, &child_path, strictness, is_known, errors);
                }
            }
            Some(_) => push(errors, path, &format!("{keyword} must be an object")),
        }
    }
    for keyword in ["items", "additionalProperties", "propertyNames", "contains", "not"] {
        if let Some(child) = map.get(keyword) {
            check_node(child, &format!("{path}/{keyword}"), strictness, is_known, errors);
        }
    }
    for keyword in ["allOf", "anyOf", "oneOf", "prefixItems"] {
        match map.get(keyword) {
            None => {}
            Some(Value::Array(children)) if !children.is_empty() => {
                for (index, child) in children.iter().enumerate() {
                    check_node(child, &format!("{path}/{keyword}/{index}"), strictness, is_known, errors);
                }
            }
            Some(_) => push(errors, path, &format!("{keyword} must be a non-empty array")),
        }
    }
}

/// Appends a structure error.
fn push(errors: &mut Vec<StructureError>, path: &str, message: &str) {
    errors.push(StructureError {
        path: path.to_string(),
        message: message.to_string(),
    });
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Rewrites a structurally valid schema into its compiled form.
#[must_use]
pub fn normalize(schema: &Value, strictness: &SchemaStrictness) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };
    let mut out = Map::new();
    for (key, value) in map {
        let normalized = match key.as_str() {
            "id" => continue,
            "$ref" => match value.as_str() {
                Some(target) if !target.starts_with('#') => Value::String(entity_pointer(target)),
                _ => value.clone(),
            },
            "properties" | "patternProperties" | "$defs" | "definitions" => match value {
                Value::Object(children) => Value::Object(
                    children.iter().map(|(name, child)| (name.clone(), normalize(child, strictness))).collect(),
                ),
                other => other.clone(),
            },
            "items" | "additionalProperties" | "propertyNames" | "contains" | "not" => {
                normalize(value, strictness)
            }
            "allOf" | "anyOf" | "oneOf" | "prefixItems" => match value {
                Value::Array(children) => {
                    Value::Array(children.iter().map(|child| normalize(child, strictness)).collect())
                }
                other => other.clone(),
            },
            _ => value.clone(),
        };
        out.insert(key.clone(), normalized);
    }
    let types = declared_types(map);
    let composed = ["allOf", "anyOf", "oneOf"].iter().any(|keyword| map.contains_key(*keyword));
    let object_like = types.contains(&"object") || (types.is_empty() && map.contains_key("properties"));
    if strictness.force_additional && object_like && !composed && !map.contains_key("additionalProperties") {
        out.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    let pinned = ["enum", "const", "minLength", "format"].iter().any(|keyword| map.contains_key(*keyword));
    if strictness.no_empty_strings && types.contains(&"string") && !pinned {
        out.insert("minLength".to_string(), Value::from(1));
    }
    Value::Object(out)
}

/// Collects bare entity references reachable from a schema node.
pub(crate) fn collect_references(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                if key == "$ref" {
                    if let Some(target) = value.as_str()
                        && !target.starts_with('#')
                    {
                        out.push(target.to_string());
                    }
                } else if !matches!(key.as_str(), "enum" | "const" | "default" | "examples") {
                    collect_references(value, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        _ => {}
    }
}

/// Returns the bundled pointer for an entity id.
pub(crate) fn entity_pointer(id: &str) -> String {
    format!("{DEFS_POINTER}{}", escape_pointer(id))
}

/// Escapes a JSON pointer token.
fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Returns the declared type names of a node.
fn declared_types(map: &Map<String, Value>) -> Vec<&'static str> {
    let names: Vec<&str> = match map.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    TYPE_NAMES.iter().copied().filter(|known| names.contains(known)).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
