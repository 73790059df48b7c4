// crates/basekit-contract/src/registry.rs
// ============================================================================
// Module: API Registry
// Description: Startup-time method and entity registration with admission checks.
// Purpose: Produce the immutable registry shared by every request.
// Dependencies: basekit-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Registration happens once, before serving, through a mutable
//! [`RegistryBuilder`]. Every method is admitted only after the metadata check
//! passes; its schemas are compiled and its identifier plan derived at that
//! point. [`RegistryBuilder::build`] freezes the result into an
//! [`ApiRegistry`] that is shared read-only (behind an `Arc`) by the request
//! pipeline. The registry snapshot served by `getAPI` is pre-serialized at
//! build time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use basekit_core::AuditSink;
use basekit_core::ErrorKind;
use basekit_core::RegistrationAuditEvent;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ErrorCatalog;
use crate::coercion::IdCoercionPlan;
use crate::entities::EntityRegistry;
use crate::entities::PendingEntity;
use crate::method::MetadataError;
use crate::method::MethodContract;
use crate::method::MethodInfo;
use crate::method::MethodSpec;
use crate::method::declares_session;
use crate::strictness::SchemaStrictness;
use crate::validator::CompiledSchema;
use crate::validator::Validators;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Substring reserved for framework-internal names.
pub const RESERVED_MARKER: &str = "__";
/// Default API version published in snapshots.
pub const DEFAULT_API_VERSION: &str = "0.9";
/// Message declared for `invalid_session` on session-bearing methods.
pub const INVALID_SESSION_MESSAGE: &str = "Session is unknown or expired.";

/// Kinds every method declares.
const BASELINE_METHOD_ERRORS: [ErrorKind; 5] = [
    ErrorKind::Internal,
    ErrorKind::SslRequired,
    ErrorKind::InvalidParameter,
    ErrorKind::NotAllowed,
    ErrorKind::NoRight,
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registration failure. Every variant is fatal to server startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The method name or declaration contains the reserved marker.
    #[error("method {0} contains the reserved marker")]
    ReservedMarker(String),
    /// A method with the same name is already registered.
    #[error("method {0} is already registered")]
    DuplicateMethod(String),
    /// An entity with the same id is already registered.
    #[error("entity {0} is already registered")]
    DuplicateEntity(String),
    /// An entity lacks a required field.
    #[error("entity is missing required field {0}")]
    MissingEntityField(&'static str),
    /// An entity schema is not acceptable.
    #[error("entity {id} is invalid: {reason}")]
    InvalidEntity {
        /// Entity id.
        id: String,
        /// Rejection cause.
        reason: String,
    },
    /// A method failed the metadata check.
    #[error("method {method} failed metadata check: {source}")]
    InvalidMetadata {
        /// Method name.
        method: String,
        /// Specific cause.
        #[source]
        source: MetadataError,
    },
    /// A declaration or snapshot could not be serialized.
    #[error("registry serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Registry construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Strictness of the input validator.
    pub input: SchemaStrictness,
    /// Strictness of the output validator.
    pub output: SchemaStrictness,
    /// API version published in snapshots.
    pub version: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            input: SchemaStrictness::default(),
            output: SchemaStrictness::default(),
            version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Admitted method with its compiled schemas.
#[derive(Debug)]
pub struct MethodDescriptor {
    /// Published contract with augmented errors.
    contract: MethodContract,
    /// Compiled input schema.
    input: CompiledSchema,
    /// Compiled output schema.
    output: CompiledSchema,
    /// Identifier rewrite plan for request bodies.
    id_plan: IdCoercionPlan,
}

impl MethodDescriptor {
    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.contract.name
    }

    /// Returns the method info with augmented errors.
    #[must_use]
    pub const fn info(&self) -> &MethodInfo {
        &self.contract.info
    }

    /// Returns whether the method requires SSL.
    #[must_use]
    pub const fn forced_ssl(&self) -> bool {
        self.contract.info.forced_ssl
    }

    /// Returns whether the method declares an error kind.
    #[must_use]
    pub fn declares(&self, kind: &ErrorKind) -> bool {
        self.contract.info.errors.contains_key(kind.as_str())
    }

    /// Returns the compiled input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &CompiledSchema {
        &self.input
    }

    /// Returns the compiled output schema.
    #[must_use]
    pub const fn output_schema(&self) -> &CompiledSchema {
        &self.output
    }

    /// Returns the identifier rewrite plan.
    #[must_use]
    pub const fn id_plan(&self) -> &IdCoercionPlan {
        &self.id_plan
    }

    /// Returns the published contract.
    #[must_use]
    pub const fn contract(&self) -> &MethodContract {
        &self.contract
    }
}

/// Output of a successful metadata check.
struct Admission {
    /// Info with augmented errors.
    info: MethodInfo,
    /// Compiled input schema.
    input: CompiledSchema,
    /// Compiled output schema.
    output: CompiledSchema,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Mutable registration phase.
pub struct RegistryBuilder {
    /// Published API version.
    version: String,
    /// Input and output validators.
    validators: Validators,
    /// Admitted entities.
    entities: EntityRegistry,
    /// Admitted methods keyed by name.
    methods: BTreeMap<String, MethodDescriptor>,
    /// Global error catalog.
    catalog: ErrorCatalog,
    /// Audit sink for registration outcomes.
    audit: Arc<dyn AuditSink>,
}

impl RegistryBuilder {
    /// Creates an empty builder with the baseline error catalog.
    #[must_use]
    pub fn new(options: RegistryOptions, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            version: options.version,
            validators: Validators::new(options.input, options.output, &audit),
            entities: EntityRegistry::new(),
            methods: BTreeMap::new(),
            catalog: ErrorCatalog::baseline(),
            audit,
        }
    }

    /// Returns the validator pair.
    #[must_use]
    pub const fn validators(&self) -> &Validators {
        &self.validators
    }

    /// Returns the entities admitted so far.
    #[must_use]
    pub const fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Returns the error catalog built so far.
    #[must_use]
    pub const fn errors(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Returns the method registered under `name`.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Registers an entity schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when `id` or `title` is missing, the id is
    /// taken, or the schema is not valid for both validators.
    pub fn register_entity(&mut self, schema: Value) -> Result<(), RegistryError> {
        let name = schema.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let result = self.admit_entity(schema);
        self.record("entity", name, result.as_ref().err());
        result
    }

    /// Registers a method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the declaration contains the reserved
    /// marker, the name is taken, or the metadata check fails.
    pub fn register_method(&mut self, name: &str, spec: MethodSpec) -> Result<(), RegistryError> {
        let result = self.admit_method(name, spec);
        self.record("method", name.to_string(), result.as_ref().err());
        result
    }

    /// Runs the method metadata check without registering anything.
    ///
    /// Returns the info augmented with the baseline error declarations.
    ///
    /// # Errors
    ///
    /// Returns the specific [`MetadataError`] cause.
    pub fn check_method_metadata(&self, spec: &MethodSpec) -> Result<MethodInfo, MetadataError> {
        self.check_metadata(spec).map(|admission| admission.info)
    }

    /// Freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Serialization`] when the snapshot cannot be
    /// serialized.
    pub fn build(self) -> Result<ApiRegistry, RegistryError> {
        let snapshot = ApiSnapshot {
            version: self.version.clone(),
            methods: self
                .methods
                .iter()
                .map(|(name, descriptor)| (name.clone(), descriptor.contract.clone()))
                .collect(),
            entities: self.entities.all().clone(),
            errors: self.catalog.entries().clone(),
        };
        let snapshot_text = SnapshotText::render(&snapshot)?;
        Ok(ApiRegistry {
            version: self.version,
            validators: self.validators,
            entities: self.entities,
            methods: self.methods,
            catalog: self.catalog,
            snapshot,
            snapshot_text,
        })
    }

    /// Validates and stores an entity.
    fn admit_entity(&mut self, schema: Value) -> Result<(), RegistryError> {
        let id = schema
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(RegistryError::MissingEntityField("id"))?
            .to_string();
        if schema.get("title").and_then(Value::as_str).is_none_or(str::is_empty) {
            return Err(RegistryError::MissingEntityField("title"));
        }
        if self.entities.contains(&id) {
            return Err(RegistryError::DuplicateEntity(id));
        }
        let pending = PendingEntity {
            base: &self.entities,
            id: &id,
            schema: &schema,
        };
        self.validators.input().check_schema(&schema, &pending).map_err(|err| RegistryError::InvalidEntity {
            id: id.clone(),
            reason: format!("as input schema: {err}"),
        })?;
        self.validators.output().check_schema(&schema, &pending).map_err(|err| RegistryError::InvalidEntity {
            id: id.clone(),
            reason: format!("as output schema: {err}"),
        })?;
        self.entities.insert(id, schema);
        Ok(())
    }

    /// Validates and stores a method.
    fn admit_method(&mut self, name: &str, spec: MethodSpec) -> Result<(), RegistryError> {
        let serialized = serde_json::to_string(&spec).map_err(|err| RegistryError::Serialization(err.to_string()))?;
        if name.contains(RESERVED_MARKER) || serialized.contains(RESERVED_MARKER) {
            return Err(RegistryError::ReservedMarker(name.to_string()));
        }
        if self.methods.contains_key(name) {
            return Err(RegistryError::DuplicateMethod(name.to_string()));
        }
        let admission = self.check_metadata(&spec).map_err(|source| RegistryError::InvalidMetadata {
            method: name.to_string(),
            source,
        })?;
        for (kind, message) in &admission.info.errors {
            self.catalog.register(&ErrorKind::from_token(kind), message);
        }
        let id_plan = IdCoercionPlan::from_schema(&spec.input, &self.entities);
        let MethodSpec {
            input,
            output,
            ..
        } = spec;
        self.methods.insert(
            name.to_string(),
            MethodDescriptor {
                contract: MethodContract {
                    name: name.to_string(),
                    input,
                    output,
                    info: admission.info,
                },
                input: admission.input,
                output: admission.output,
                id_plan,
            },
        );
        Ok(())
    }

    /// Runs the ordered metadata checks and augments the declared errors.
    fn check_metadata(&self, spec: &MethodSpec) -> Result<Admission, MetadataError> {
        let info = spec.info.as_ref().ok_or(MetadataError::MissingInfo)?;
        if info.description.as_deref().is_none_or(|text| text.trim().is_empty()) {
            return Err(MetadataError::MissingDescription);
        }
        let input = self.validators.input().compile(&spec.input, &self.entities).map_err(MetadataError::InvalidInput)?;
        let output =
            self.validators.output().compile(&spec.output, &self.entities).map_err(MetadataError::InvalidOutput)?;
        let sample = info.sample_result.as_ref().ok_or(MetadataError::MissingSampleResult)?;
        self.validators
            .output()
            .validate(sample, &output)
            .map_err(|errors| MetadataError::SampleResultMismatch(errors.join("; ")))?;
        if let Some(kind) = info.errors.keys().find(|kind| !ErrorKind::is_valid_token(kind)) {
            return Err(MetadataError::InvalidErrorKind(kind.clone()));
        }

        let mut augmented = info.clone();
        for (kind, message) in &mut augmented.errors {
            if message.is_empty() {
                *message = self.catalog.message_or_default(&ErrorKind::from_token(kind));
            }
        }
        for kind in &BASELINE_METHOD_ERRORS {
            augmented
                .errors
                .entry(kind.as_str().to_string())
                .or_insert_with(|| self.catalog.message_or_default(kind));
        }
        if declares_session(&spec.input) {
            augmented
                .errors
                .entry(ErrorKind::InvalidSession.as_str().to_string())
                .or_insert_with(|| INVALID_SESSION_MESSAGE.to_string());
        }
        Ok(Admission {
            info: augmented,
            input,
            output,
        })
    }

    /// Records a registration outcome.
    fn record(&self, item: &'static str, name: String, error: Option<&RegistryError>) {
        self.audit.record_registration(&RegistrationAuditEvent::new(item, name, error.map(ToString::to_string)));
    }
}

// ============================================================================
// SECTION: Frozen Registry
// ============================================================================

/// Registry snapshot published by `getAPI`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSnapshot {
    /// API version.
    pub version: String,
    /// Published method contracts keyed by name.
    pub methods: BTreeMap<String, MethodContract>,
    /// Entity schemas keyed by id.
    pub entities: BTreeMap<String, Value>,
    /// Error catalog keyed by kind token.
    pub errors: BTreeMap<String, String>,
}

/// Pre-serialized snapshot sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotText {
    /// Serialized version string.
    pub version: String,
    /// Serialized methods map.
    pub methods: String,
    /// Serialized entities map.
    pub entities: String,
    /// Serialized error catalog.
    pub errors: String,
}

impl SnapshotText {
    /// Serializes every snapshot section.
    fn render(snapshot: &ApiSnapshot) -> Result<Self, RegistryError> {
        Ok(Self {
            version: encode(&snapshot.version)?,
            methods: encode(&snapshot.methods)?,
            entities: encode(&snapshot.entities)?,
            errors: encode(&snapshot.errors)?,
        })
    }
}

/// Serializes one snapshot section.
fn encode<T: Serialize>(value: &T) -> Result<String, RegistryError> {
    serde_json::to_string(value).map_err(|err| RegistryError::Serialization(err.to_string()))
}

/// Immutable registry shared by the request pipeline.
pub struct ApiRegistry {
    /// Published API version.
    version: String,
    /// Input and output validators.
    validators: Validators,
    /// Admitted entities.
    entities: EntityRegistry,
    /// Admitted methods keyed by name.
    methods: BTreeMap<String, MethodDescriptor>,
    /// Global error catalog.
    catalog: ErrorCatalog,
    /// Published snapshot.
    snapshot: ApiSnapshot,
    /// Pre-serialized snapshot sections.
    snapshot_text: SnapshotText,
}

impl fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRegistry")
            .field("version", &self.version)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}

impl ApiRegistry {
    /// Returns the published API version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the method registered under `name`.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Returns every method in name order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }

    /// Returns the entity registry.
    #[must_use]
    pub const fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Returns the error catalog.
    #[must_use]
    pub const fn errors(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Returns the validator pair.
    #[must_use]
    pub const fn validators(&self) -> &Validators {
        &self.validators
    }

    /// Returns the published snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &ApiSnapshot {
        &self.snapshot
    }

    /// Returns the pre-serialized snapshot sections.
    #[must_use]
    pub const fn snapshot_text(&self) -> &SnapshotText {
        &self.snapshot_text
    }
}
