// crates/basekit-server/src/context.rs
// ============================================================================
// Module: Request Context
// Description: Per-call state threaded through the request pipeline.
// Purpose: Carry the body, session, and transport facts for one API call.
// Dependencies: basekit-contract, basekit-core
// ============================================================================

//! ## Overview
//! A [`RequestContext`] lives for exactly one call. Processors may enrich it
//! (the session processor attaches the resolved [`SessionRecord`]); method
//! bodies read it. Nothing in it is persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use basekit_contract::ApiRegistry;
use basekit_core::SessionRecord;
use serde_json::Value;

// ============================================================================
// SECTION: Incoming Request
// ============================================================================

/// Transport-level facts about a call, before the pipeline runs.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Method name taken from the request path.
    pub method: String,
    /// Parsed request body; `Value::Null` when the body was empty.
    pub body: Value,
    /// Whether the call arrived on the SSL listener.
    pub ssl: bool,
    /// Peer address when known.
    pub peer: Option<SocketAddr>,
}

impl IncomingRequest {
    /// Builds a plain (non-SSL) request without a peer address.
    #[must_use]
    pub fn new(method: impl Into<String>, body: Value) -> Self {
        Self {
            method: method.into(),
            body,
            ssl: false,
            peer: None,
        }
    }

    /// Returns a copy flagged as arriving over SSL.
    #[must_use]
    pub const fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Returns a copy with the peer address set.
    #[must_use]
    pub const fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }
}

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-call context handed to processors and method bodies.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Method name being invoked.
    pub method: String,
    /// Request body after validation and identifier coercion.
    pub body: Value,
    /// Whether the call arrived over SSL.
    pub ssl: bool,
    /// Peer address when known.
    pub peer: Option<SocketAddr>,
    /// Session resolved by the session processor.
    pub session: Option<SessionRecord>,
    /// Instant the pipeline accepted the call.
    pub started: Instant,
    /// Frozen registry the call is served from.
    pub registry: Arc<ApiRegistry>,
}

impl RequestContext {
    /// Builds a context from an incoming request.
    #[must_use]
    pub fn new(request: IncomingRequest, registry: Arc<ApiRegistry>) -> Self {
        Self {
            method: request.method,
            body: request.body,
            ssl: request.ssl,
            peer: request.peer,
            session: None,
            started: Instant::now(),
            registry,
        }
    }

    /// Returns the raw `session` token from the body when present.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.body.get("session").and_then(Value::as_str)
    }

    /// Returns a body field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Returns elapsed time since the call was accepted, in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
