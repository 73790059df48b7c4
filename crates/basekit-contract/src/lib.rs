// crates/basekit-contract/src/lib.rs
// ============================================================================
// Module: BaseKit Contract Library
// Description: Schema registry, strict validation, and method registration.
// Purpose: Define the API surface that the request pipeline serves.
// Dependencies: crate::{catalog, coercion, entities, method, registry, strictness, validator}
// ============================================================================

//! ## Overview
//! The contract crate owns everything that is decided at startup: entity
//! schemas, method declarations, the error catalog, and the compiled
//! validators. Registration runs through [`RegistryBuilder`] and ends in an
//! immutable [`ApiRegistry`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod coercion;
pub mod entities;
pub mod method;
pub mod registry;
pub mod strictness;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::ErrorCatalog;
pub use coercion::IdCoercionPlan;
pub use entities::EntityRegistry;
pub use method::MetadataError;
pub use method::MethodContract;
pub use method::MethodInfo;
pub use method::MethodSpec;
pub use registry::ApiRegistry;
pub use registry::ApiSnapshot;
pub use registry::MethodDescriptor;
pub use registry::RegistryBuilder;
pub use registry::RegistryError;
pub use registry::RegistryOptions;
pub use registry::SnapshotText;
pub use strictness::SchemaStrictness;
pub use strictness::StructureError;
pub use validator::CompiledSchema;
pub use validator::EntityLookup;
pub use validator::SchemaError;
pub use validator::SchemaValidator;
pub use validator::ValidatorRole;
pub use validator::Validators;
