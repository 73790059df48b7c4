// crates/basekit-contract/src/validator.rs
// ============================================================================
// Module: Schema Validator
// Description: Strict JSON Schema compilation and validation.
// Purpose: Validate request and response payloads against method schemas.
// Dependencies: basekit-core, jsonschema, serde_json
// ============================================================================

//! ## Overview
//! A [`SchemaValidator`] compiles schemas in the strict dialect (see
//! [`crate::strictness`]) with the API's custom formats registered, bundling
//! referenced entities into `$defs`. [`Validators`] pairs the independently
//! configured input and output instances and maps failures onto the API error
//! taxonomy: input mismatches are `invalid_parameter` carrying the validator
//! diagnostics, output mismatches are always `internal`.
//! Every failure is recorded to the audit sink with schema, value, and
//! validator messages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use basekit_core::ApiError;
use basekit_core::AuditSink;
use basekit_core::ValidationAuditEvent;
use basekit_core::is_object_id_text;
use basekit_core::is_timestamp_text;
use basekit_core::mask_passwords;
use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::strictness::FORMAT_OBJECT_ID;
use crate::strictness::FORMAT_OBJECT_ID_OR_EMPTY;
use crate::strictness::FORMAT_TIMESTAMP;
use crate::strictness::SchemaStrictness;
use crate::strictness::StructureError;
use crate::strictness::check_structure;
use crate::strictness::collect_references;
use crate::strictness::normalize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema compilation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Schema breaks the strict dialect.
    #[error("schema structure invalid: {}", join_structure(.0))]
    Structure(Vec<StructureError>),
    /// Schema references an entity that is not registered.
    #[error("unknown entity reference: {0}")]
    UnknownEntity(String),
    /// The validator rejected the schema.
    #[error("schema compilation failed: {0}")]
    Compile(String),
}

/// Joins structure errors for display.
fn join_structure(errors: &[StructureError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

// ============================================================================
// SECTION: Entity Lookup
// ============================================================================

/// Resolves bare `$ref` targets to entity schemas.
pub trait EntityLookup {
    /// Returns the entity schema registered under `id`.
    fn entity(&self, id: &str) -> Option<&Value>;
}

// ============================================================================
// SECTION: Compiled Schemas
// ============================================================================

/// Schema compiled for repeated validation.
pub struct CompiledSchema {
    /// Schema as declared.
    source: Value,
    /// Compiled validator over the normalized, bundled schema.
    validator: Validator,
}

impl CompiledSchema {
    /// Returns the schema as declared.
    #[must_use]
    pub const fn source(&self) -> &Value {
        &self.source
    }

    /// Returns true when the declared schema is `{}`.
    #[must_use]
    pub fn is_empty_schema(&self) -> bool {
        self.source.as_object().is_some_and(Map::is_empty)
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema").field("source", &self.source).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validator instance role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorRole {
    /// Validates request bodies.
    Input,
    /// Validates method results.
    Output,
}

impl ValidatorRole {
    /// Returns the stable label used in audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Strict schema validator with custom formats.
pub struct SchemaValidator {
    /// Instance role.
    role: ValidatorRole,
    /// Strictness flags.
    strictness: SchemaStrictness,
    /// Audit sink for failure diagnostics.
    audit: Arc<dyn AuditSink>,
}

impl SchemaValidator {
    /// Creates a validator instance.
    #[must_use]
    pub fn new(role: ValidatorRole, strictness: SchemaStrictness, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            role,
            strictness,
            audit,
        }
    }

    /// Returns the strictness flags.
    #[must_use]
    pub const fn strictness(&self) -> &SchemaStrictness {
        &self.strictness
    }

    /// Checks that a schema is structurally valid and compiles.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] describing the first failing step.
    pub fn check_schema(&self, schema: &Value, entities: &dyn EntityLookup) -> Result<(), SchemaError> {
        self.compile(schema, entities).map(|_| ())
    }

    /// Compiles a schema, bundling referenced entities.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the schema breaks the dialect, references
    /// an unknown entity, or fails compilation.
    pub fn compile(&self, schema: &Value, entities: &dyn EntityLookup) -> Result<CompiledSchema, SchemaError> {
        let result = self.compile_inner(schema, entities);
        if let Err(error) = &result {
            self.audit.record_validation(&ValidationAuditEvent::new(
                self.role.as_str(),
                schema.clone(),
                None,
                vec![error.to_string()],
            ));
        }
        result
    }

    /// Validates a value, returning validator messages on mismatch.
    ///
    /// # Errors
    ///
    /// Returns the validator's messages when the value does not match.
    pub fn validate(&self, value: &Value, schema: &CompiledSchema) -> Result<(), Vec<String>> {
        if schema.validator.is_valid(value) {
            return Ok(());
        }
        let errors: Vec<String> = schema.validator.iter_errors(value).map(|err| err.to_string()).collect();
        self.audit.record_validation(&ValidationAuditEvent::new(
            self.role.as_str(),
            schema.source.clone(),
            Some(mask_passwords(value)),
            errors.clone(),
        ));
        Err(errors)
    }

    /// Runs the structure check, bundles entities, and compiles.
    fn compile_inner(&self, schema: &Value, entities: &dyn EntityLookup) -> Result<CompiledSchema, SchemaError> {
        check_structure(schema, &self.strictness, &|id| entities.entity(id).is_some())
            .map_err(SchemaError::Structure)?;
        let bundled = bundle(schema, &self.strictness, entities)?;
        let validator = build_validator(&bundled)?;
        Ok(CompiledSchema {
            source: schema.clone(),
            validator,
        })
    }
}

// ============================================================================
// SECTION: Validator Pair
// ============================================================================

/// Independently configured input and output validators.
pub struct Validators {
    /// Request body validator.
    input: SchemaValidator,
    /// Result validator.
    output: SchemaValidator,
}

impl Validators {
    /// Creates the validator pair.
    #[must_use]
    pub fn new(input: SchemaStrictness, output: SchemaStrictness, audit: &Arc<dyn AuditSink>) -> Self {
        Self {
            input: SchemaValidator::new(ValidatorRole::Input, input, Arc::clone(audit)),
            output: SchemaValidator::new(ValidatorRole::Output, output, Arc::clone(audit)),
        }
    }

    /// Returns the input validator.
    #[must_use]
    pub const fn input(&self) -> &SchemaValidator {
        &self.input
    }

    /// Returns the output validator.
    #[must_use]
    pub const fn output(&self) -> &SchemaValidator {
        &self.output
    }

    /// Validates a request body.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` whose message is the JSON array of
    /// validator messages.
    pub fn validate_input(&self, value: &Value, schema: &CompiledSchema) -> Result<(), ApiError> {
        self.input.validate(value, schema).map_err(|errors| {
            let message = serde_json::to_string(&errors)
                .unwrap_or_else(|_| "Request does not match the input schema.".to_string());
            ApiError::invalid_parameter(message).with_context(json!({ "errors": errors }))
        })
    }

    /// Validates a method result.
    ///
    /// # Errors
    ///
    /// Returns `internal` for an empty schema or any mismatch.
    pub fn validate_output(&self, value: &Value, schema: &CompiledSchema) -> Result<(), ApiError> {
        if schema.is_empty_schema() {
            return Err(ApiError::internal("Output schema is empty."));
        }
        self.output.validate(value, schema).map_err(|errors| {
            ApiError::internal("Result does not match the output schema.")
                .with_context(json!({ "errors": errors }))
        })
    }

    /// Returns whether a method result matches its schema.
    #[must_use]
    pub fn validate_output_sync(&self, value: &Value, schema: &CompiledSchema) -> bool {
        self.validate_output(value, schema).is_ok()
    }

    /// Returns whether a schema is acceptable as a request schema.
    #[must_use]
    pub fn validate_input_schema(&self, schema: &Value, entities: &dyn EntityLookup) -> bool {
        self.input.check_schema(schema, entities).is_ok()
    }

    /// Returns whether a schema is acceptable as a result schema.
    #[must_use]
    pub fn validate_output_schema(&self, schema: &Value, entities: &dyn EntityLookup) -> bool {
        self.output.check_schema(schema, entities).is_ok()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes a schema and embeds every transitively referenced entity.
fn bundle(
    schema: &Value,
    strictness: &SchemaStrictness,
    entities: &dyn EntityLookup,
) -> Result<Value, SchemaError> {
    let mut root = normalize(schema, strictness);
    let mut pending = Vec::new();
    collect_references(schema, &mut pending);
    let mut seen = BTreeSet::new();
    let mut defs = Map::new();
    while let Some(id) = pending.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let entity = entities.entity(&id).ok_or_else(|| SchemaError::UnknownEntity(id.clone()))?;
        collect_references(entity, &mut pending);
        defs.insert(id, normalize(entity, strictness));
    }
    if defs.is_empty() {
        return Ok(root);
    }
    if let Some(object) = root.as_object_mut() {
        match object.get_mut("$defs") {
            Some(Value::Object(existing)) => existing.extend(defs),
            _ => {
                object.insert("$defs".to_string(), Value::Object(defs));
            }
        }
    }
    Ok(root)
}

/// Compiles a bundled schema with the API formats registered.
fn build_validator(schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .should_validate_formats(true)
        .with_format(FORMAT_OBJECT_ID, |text: &str| is_object_id_text(text))
        .with_format(FORMAT_OBJECT_ID_OR_EMPTY, |text: &str| text.is_empty() || is_object_id_text(text))
        .with_format(FORMAT_TIMESTAMP, |text: &str| is_timestamp_text(text))
        .build(schema)
        .map_err(|err| SchemaError::Compile(err.to_string()))
}
