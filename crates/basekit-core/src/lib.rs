// crates/basekit-core/src/lib.rs
// ============================================================================
// Module: BaseKit Core Library
// Description: Public API surface for the BaseKit core.
// Purpose: Expose the error taxonomy, result writer, audit sinks, and storage
//          interfaces shared by every BaseKit crate.
// Dependencies: crate::{audit, error, identifiers, interfaces, memory, password, redaction, time,
//               writer}
// ============================================================================

//! ## Overview
//! BaseKit core holds the transport-independent building blocks of the API
//! framework: the closed error vocabulary, the streaming JSON writer, audit
//! event sinks, and the narrow storage and session interfaces method bodies
//! consume.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod error;
pub mod identifiers;
pub mod interfaces;
pub mod memory;
pub mod password;
pub mod redaction;
pub mod time;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FailureAuditEvent;
pub use audit::FileAuditSink;
pub use audit::LifecycleAuditEvent;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RegistrationAuditEvent;
pub use audit::RequestAuditEvent;
pub use audit::RequestAuditEventParams;
pub use audit::StderrAuditSink;
pub use audit::ValidationAuditEvent;
pub use error::ApiError;
pub use error::ErrorKind;
pub use error::STATUS_OK;
pub use identifiers::IdentifierError;
pub use identifiers::ObjectId;
pub use identifiers::is_object_id_text;
pub use interfaces::DocumentStore;
pub use interfaces::DocumentStream;
pub use interfaces::FindAndModifyOptions;
pub use interfaces::SessionRecord;
pub use interfaces::SessionStore;
pub use interfaces::StorageError;
pub use memory::InMemoryDocumentStore;
pub use memory::InMemorySessionStore;
pub use password::generate_session_token;
pub use password::hash_password;
pub use password::verify_password;
pub use redaction::fingerprint;
pub use redaction::mask_passwords;
pub use time::Timestamp;
pub use time::TimestampError;
pub use time::is_timestamp_text;
pub use writer::ContainerKind;
pub use writer::JsonWriter;
pub use writer::WriterError;
pub use writer::WriterState;
