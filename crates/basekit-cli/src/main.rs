// crates/basekit-cli/src/main.rs
// ============================================================================
// Module: BaseKit CLI
// Description: Command-line entry point for serving and exporting the API.
// Purpose: Load configuration, run the HTTP server, and publish the registry.
// Dependencies: basekit-config, basekit-contract, basekit-core, basekit-server, clap, tokio
// ============================================================================

//! ## Overview
//! The `basekit` binary exposes three commands:
//!
//! - `serve` loads configuration and serves the API over HTTP (and HTTPS when
//!   configured).
//! - `config validate` loads and validates configuration without serving.
//! - `api export` writes the registry snapshot consumed by client SDK
//!   generators, together with the server address and port they target.
//!
//! Configuration is resolved from `--config`, then `BASEKIT_CONFIG`, then
//! `basekit.toml`. All failures exit non-zero with a message on stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use basekit_config::BaseKitConfig;
use basekit_contract::ApiSnapshot;
use basekit_core::AuditSink;
use basekit_core::InMemorySessionStore;
use basekit_core::NoopAuditSink;
use basekit_core::SessionStore;
use basekit_server::ApiServer;
use basekit_server::ApiService;
use basekit_server::audit_sink_from_config;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File name of the exported registry snapshot.
const API_EXPORT_FILE: &str = "api.json";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// BaseKit command-line interface.
#[derive(Parser, Debug)]
#[command(name = "basekit", disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the API.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Registry utilities.
    Api {
        /// Selected api subcommand.
        #[command(subcommand)]
        command: ApiCommand,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to basekit.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to basekit.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Registry subcommands.
#[derive(Subcommand, Debug)]
enum ApiCommand {
    /// Export the registry snapshot for SDK generators.
    Export(ApiExportCommand),
}

/// Arguments for `api export`.
#[derive(Args, Debug)]
struct ApiExportCommand {
    /// Optional config file path (defaults to basekit.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a printable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Serve(command) => command_serve(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
        Commands::Api {
            command,
        } => match command {
            ApiCommand::Export(command) => command_api_export(&command),
        },
    }
}

/// Prints the top-level help text.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout_line(&help).map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command on a runtime sized by `server.workers`.
fn command_serve(command: &ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if config.server.workers > 0 {
        builder.worker_threads(config.server.workers);
    }
    let runtime =
        builder.build().map_err(|err| CliError::new(format!("runtime init failed: {err}")))?;
    let audit = audit_sink_from_config(&config.audit)
        .map_err(|err| CliError::new(format!("serve init failed: {err}")))?;
    let service = build_service(config, audit)?;
    runtime
        .block_on(service.serve())
        .map_err(|err| CliError::new(format!("serve failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Builds the servable API with the built-in methods installed.
fn build_service(config: BaseKitConfig, audit: Arc<dyn AuditSink>) -> CliResult<ApiService> {
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let server = ApiServer::new(config, audit, sessions)
        .map_err(|err| CliError::new(format!("serve init failed: {err}")))?;
    server.build().map_err(|err| CliError::new(format!("serve init failed: {err}")))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(command.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads configuration, mapping failures to a CLI error.
fn load_config(path: Option<&Path>) -> CliResult<BaseKitConfig> {
    BaseKitConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Api Commands
// ============================================================================

/// Executes the registry export command.
fn command_api_export(command: &ApiExportCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let path = export_api(config)?;
    write_stdout_line(&format!("api snapshot written to {}", path.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Writes the registry snapshot into the generator output directory.
fn export_api(config: BaseKitConfig) -> CliResult<PathBuf> {
    let (output_dir, address, port) = config
        .generator
        .require_export_target()
        .map_err(|err| CliError::new(format!("api export failed: {err}")))?;
    let service = build_service(config, Arc::new(NoopAuditSink))?;
    let snapshot: &ApiSnapshot = service.pipeline().registry().snapshot();
    let document = json!({
        "server": {"address": address, "port": port},
        "api": snapshot,
    });
    let bytes = serde_json::to_vec_pretty(&document)
        .map_err(|err| CliError::new(format!("api export failed: {err}")))?;
    fs::create_dir_all(&output_dir).map_err(|err| {
        CliError::new(format!("api export failed: {}: {err}", output_dir.display()))
    })?;
    let path = output_dir.join(API_EXPORT_FILE);
    fs::write(&path, bytes)
        .map_err(|err| CliError::new(format!("api export failed: {}: {err}", path.display())))?;
    Ok(path)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output failure message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================
