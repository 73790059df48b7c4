// crates/basekit-core/src/audit.rs
// ============================================================================
// Module: Audit Logging
// Description: Structured audit events for registration and request handling.
// Purpose: Emit JSON-line logs without binding to a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain serializable structs. An [`AuditSink`] decides where
//! they go: stderr, an append-only file, memory (tests), or nowhere.
//! Deployments route the JSON lines to their own log pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorKind;

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// One completed API call.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Method name requested.
    pub method: String,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Whether the call arrived over SSL.
    pub ssl: bool,
    /// Session token fingerprint when a session was supplied.
    pub session: Option<String>,
    /// Resolved user identifier when a session was resolved.
    pub user_id: Option<String>,
    /// Status token written to the client.
    pub status: String,
    /// Wall-clock duration of the call in milliseconds.
    pub duration_ms: u64,
}

/// Parameters for [`RequestAuditEvent`].
pub struct RequestAuditEventParams {
    /// Method name requested.
    pub method: String,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Whether the call arrived over SSL.
    pub ssl: bool,
    /// Session token fingerprint.
    pub session: Option<String>,
    /// Resolved user identifier.
    pub user_id: Option<String>,
    /// Status token written to the client.
    pub status: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl RequestAuditEvent {
    /// Builds a request event stamped with the current time.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        Self {
            event: "api_request",
            timestamp_ms: now_ms(),
            method: params.method,
            peer_ip: params.peer_ip,
            ssl: params.ssl,
            session: params.session,
            user_id: params.user_id,
            status: params.status,
            duration_ms: params.duration_ms,
        }
    }
}

/// Failed API call with its true cause.
#[derive(Debug, Clone, Serialize)]
pub struct FailureAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Method name requested.
    pub method: String,
    /// Error kind raised inside the pipeline, before any downgrade.
    pub error_kind: ErrorKind,
    /// Error message raised inside the pipeline.
    pub message: String,
    /// Structured error context when present.
    pub context: Option<Value>,
    /// Request body with passwords masked.
    pub body: Value,
}

impl FailureAuditEvent {
    /// Builds a failure event stamped with the current time.
    #[must_use]
    pub fn new(
        method: String,
        error_kind: ErrorKind,
        message: String,
        context: Option<Value>,
        body: Value,
    ) -> Self {
        Self {
            event: "api_failure",
            timestamp_ms: now_ms(),
            method,
            error_kind,
            message,
            context,
            body,
        }
    }
}

/// Schema validation failure diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Validator instance (`input` or `output`).
    pub validator: &'static str,
    /// Schema validated against.
    pub schema: Value,
    /// Offending value, omitted for schema structure checks.
    pub value: Option<Value>,
    /// Validator messages.
    pub errors: Vec<String>,
}

impl ValidationAuditEvent {
    /// Builds a validation event stamped with the current time.
    #[must_use]
    pub fn new(
        validator: &'static str,
        schema: Value,
        value: Option<Value>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            event: "schema_validation",
            timestamp_ms: now_ms(),
            validator,
            schema,
            value,
            errors,
        }
    }
}

/// Method or entity registration outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Registered item class (`method` or `entity`).
    pub item: &'static str,
    /// Method name or entity id.
    pub name: String,
    /// Whether registration succeeded.
    pub accepted: bool,
    /// Rejection cause.
    pub reason: Option<String>,
}

impl RegistrationAuditEvent {
    /// Builds a registration event stamped with the current time.
    #[must_use]
    pub fn new(item: &'static str, name: String, reason: Option<String>) -> Self {
        Self {
            event: "registration",
            timestamp_ms: now_ms(),
            item,
            accepted: reason.is_none(),
            name,
            reason,
        }
    }
}

/// Server lifecycle notice (listener bound, panic, shutdown).
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Lifecycle phase label.
    pub phase: &'static str,
    /// Free-form detail.
    pub detail: String,
}

impl LifecycleAuditEvent {
    /// Builds a lifecycle event stamped with the current time.
    #[must_use]
    pub fn new(phase: &'static str, detail: impl Into<String>) -> Self {
        Self {
            event: "server_lifecycle",
            timestamp_ms: now_ms(),
            phase,
            detail: detail.into(),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for structured events.
pub trait AuditSink: Send + Sync {
    /// Record a completed request.
    fn record_request(&self, event: &RequestAuditEvent);

    /// Record a failed request with its true cause.
    fn record_failure(&self, _event: &FailureAuditEvent) {}

    /// Record schema validation diagnostics.
    fn record_validation(&self, _event: &ValidationAuditEvent) {}

    /// Record a registration outcome.
    fn record_registration(&self, _event: &RegistrationAuditEvent) {}

    /// Record a lifecycle notice.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one event as a JSON line.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        Self::emit(event);
    }

    fn record_failure(&self, event: &FailureAuditEvent) {
        Self::emit(event);
    }

    fn record_validation(&self, event: &ValidationAuditEvent) {
        Self::emit(event);
    }

    fn record_registration(&self, event: &RegistrationAuditEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event as a JSON line.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.emit(event);
    }

    fn record_failure(&self, event: &FailureAuditEvent) {
        self.emit(event);
    }

    fn record_validation(&self, event: &ValidationAuditEvent) {
        self.emit(event);
    }

    fn record_registration(&self, event: &RegistrationAuditEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.emit(event);
    }
}

/// Audit sink that keeps events in memory as JSON values.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded events whose `event` field matches `name`.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Stores one event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.push(event);
    }

    fn record_failure(&self, event: &FailureAuditEvent) {
        self.push(event);
    }

    fn record_validation(&self, event: &ValidationAuditEvent) {
        self.push(event);
    }

    fn record_registration(&self, event: &RegistrationAuditEvent) {
        self.push(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.push(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_request(&self, _event: &RequestAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current time in milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_millis()).unwrap_or(0)
}
