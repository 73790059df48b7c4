// crates/basekit-config/src/config.rs
// ============================================================================
// Module: BaseKit Configuration
// Description: Configuration loading and validation for BaseKit servers.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: basekit-contract, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! A sibling `<stem>.local.toml` file, when present, is merged over the main
//! file table by table so deployments can override single keys without
//! copying the whole file. Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use basekit_contract::RegistryOptions;
use basekit_contract::SchemaStrictness;
use serde::Deserialize;
use thiserror::Error;
use toml::Table;
use toml::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "basekit.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "BASEKIT_CONFIG";
/// Suffix inserted before the extension of the local overlay file.
const LOCAL_OVERLAY_SUFFIX: &str = "local";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default plain HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Upper bound on the request body size in bytes.
const MAX_BODY_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Default idle timeout in milliseconds.
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 120_000;
/// Minimum idle timeout in milliseconds.
const MIN_IDLE_TIMEOUT_MS: u64 = 1_000;
/// Maximum idle timeout in milliseconds.
const MAX_IDLE_TIMEOUT_MS: u64 = 3_600_000;
/// Maximum worker thread count.
const MAX_WORKERS: usize = 1024;
/// Maximum API version label length.
const MAX_VERSION_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// BaseKit configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseKitConfig {
    /// Listener and transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Request pipeline switches.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Validator strictness per instance.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Published API metadata.
    #[serde(default)]
    pub api: ApiConfig,
    /// Client SDK generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl BaseKitConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let mut table = read_table(&resolved)?;
        let overlay = local_overlay_path(&resolved);
        if overlay.is_file() {
            validate_path(&overlay)?;
            merge_tables(&mut table, read_table(&overlay)?);
        }
        let config: Self = Value::Table(table)
            .try_into()
            .map_err(|err: toml::de::Error| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.audit.validate()?;
        self.api.validate()?;
        self.generator.validate()?;
        Ok(())
    }

    /// Returns registry options derived from validation and API settings.
    #[must_use]
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            input: self.validation.input,
            output: self.validation.output,
            version: self.api.version.clone(),
        }
    }
}

// ============================================================================
// SECTION: Server Config
// ============================================================================

/// Listener and transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Plain HTTP bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// HTTPS bind address; requires `tls`.
    #[serde(default)]
    pub https_bind: Option<String>,
    /// TLS certificate settings for the HTTPS listener.
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Idle window for request reads and response writes, in milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Worker threads; zero means one per available core.
    #[serde(default)]
    pub workers: usize,
    /// Abort the process when any task panics.
    #[serde(default = "default_true")]
    pub abort_on_panic: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            https_bind: None,
            tls: None,
            max_body_bytes: default_max_body_bytes(),
            idle_timeout_ms: default_idle_timeout_ms(),
            workers: 0,
            abort_on_panic: true,
        }
    }
}

impl ServerConfig {
    /// Validates listener settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparseable addresses, missing TLS
    /// material, or out-of-range limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_addr("server.bind", &self.bind)?;
        if let Some(https_bind) = &self.https_bind {
            parse_addr("server.https_bind", https_bind)?;
            let tls = self
                .tls
                .as_ref()
                .ok_or_else(|| ConfigError::Invalid("server.https_bind requires server.tls".to_string()))?;
            tls.validate()?;
        }
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        if !(MIN_IDLE_TIMEOUT_MS..=MAX_IDLE_TIMEOUT_MS).contains(&self.idle_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "server.idle_timeout_ms must be between {MIN_IDLE_TIMEOUT_MS} and {MAX_IDLE_TIMEOUT_MS}"
            )));
        }
        if self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!("server.workers must be at most {MAX_WORKERS}")));
        }
        Ok(())
    }

    /// Returns the parsed plain HTTP bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("server.bind", &self.bind)
    }

    /// Returns the parsed HTTPS bind address when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn https_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.https_bind.as_deref().map(|bind| parse_addr("server.https_bind", bind)).transpose()
    }
}

/// TLS certificate settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerTlsConfig {
    /// PEM certificate chain path.
    pub cert_path: String,
    /// PEM private key path.
    pub key_path: String,
}

impl ServerTlsConfig {
    /// Validates TLS file paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("server.tls.cert_path", &self.cert_path)?;
        validate_path_string("server.tls.key_path", &self.key_path)
    }
}

// ============================================================================
// SECTION: Pipeline and Validation Config
// ============================================================================

/// Request pipeline switches.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Validate every result against the output schema.
    #[serde(default)]
    pub debug_output_validation: bool,
    /// Rewrite identifier fields to the storage layer's native form.
    #[serde(default)]
    pub object_id_parsing: bool,
}

/// Validator strictness per instance.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Request validator strictness.
    #[serde(default)]
    pub input: SchemaStrictness,
    /// Result validator strictness.
    #[serde(default)]
    pub output: SchemaStrictness,
}

// ============================================================================
// SECTION: Audit, API, and Generator Config
// ============================================================================

/// Audit logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Append events to this file instead of stderr.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates the audit path.
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.path {
            Some(path) => validate_path_string("audit.path", path),
            None => Ok(()),
        }
    }
}

/// Published API metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// API version published by `getAPI`.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
        }
    }
}

impl ApiConfig {
    /// Validates the version label.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() || self.version.len() > MAX_VERSION_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "api.version must be 1 to {MAX_VERSION_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Client SDK generator settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Directory receiving generated artifacts.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Server host baked into generated clients.
    #[serde(default)]
    pub server_address: Option<String>,
    /// Server port baked into generated clients.
    #[serde(default)]
    pub server_port: Option<u16>,
}

impl GeneratorConfig {
    /// Validates any generator fields that are present.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(output_dir) = &self.output_dir {
            validate_path_string("generator.output_dir", output_dir)?;
        }
        if self.server_address.as_deref().is_some_and(|address| address.trim().is_empty()) {
            return Err(ConfigError::Invalid("generator.server_address must not be empty".to_string()));
        }
        if self.server_port == Some(0) {
            return Err(ConfigError::Invalid("generator.server_port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Returns the output directory, address, and port required for export.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first missing field.
    pub fn require_export_target(&self) -> Result<(PathBuf, String, u16), ConfigError> {
        let output_dir = self
            .output_dir
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("generator.output_dir is required".to_string()))?;
        let address = self
            .server_address
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("generator.server_address is required".to_string()))?;
        let port = self
            .server_port
            .ok_or_else(|| ConfigError::Invalid("generator.server_port is required".to_string()))?;
        Ok((PathBuf::from(output_dir), address.clone(), port))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument, environment, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Enforces path length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Enforces limits on a path-valued config field.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    if value.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(value).components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH) {
        return Err(ConfigError::Invalid(format!("{field} component too long")));
    }
    Ok(())
}

/// Reads a config file into a TOML table with size and encoding limits.
fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content =
        std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Returns the local overlay path: `dir/<stem>.local.<ext>`.
fn local_overlay_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{LOCAL_OVERLAY_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{LOCAL_OVERLAY_SUFFIX}"),
    };
    path.with_file_name(name)
}

/// Merges `overlay` into `base`; nested tables merge, other values replace.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Parses a socket address field.
fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid(format!("{field} is not a valid socket address: {value}")))
}

/// Default plain HTTP bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default idle timeout.
const fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}

/// Serde default for flags that start enabled.
const fn default_true() -> bool {
    true
}

/// Default API version label.
fn default_version() -> String {
    basekit_contract::registry::DEFAULT_API_VERSION.to_string()
}
