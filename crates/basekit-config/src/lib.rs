// crates/basekit-config/src/lib.rs
// ============================================================================
// Module: BaseKit Config Library
// Description: Configuration model, loading, and validation.
// Purpose: Expose the canonical server configuration.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! BaseKit configuration is a single TOML document (plus an optional local
//! overlay) covering listeners, pipeline switches, validator strictness,
//! audit logging, and SDK generator targets.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ApiConfig;
pub use config::AuditConfig;
pub use config::BaseKitConfig;
pub use config::ConfigError;
pub use config::GeneratorConfig;
pub use config::PipelineConfig;
pub use config::ServerConfig;
pub use config::ServerTlsConfig;
pub use config::ValidationConfig;
