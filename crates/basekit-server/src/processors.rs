// crates/basekit-server/src/processors.rs
// ============================================================================
// Module: Request Processors
// Description: Cross-cutting hooks run before every method body.
// Purpose: Resolve sessions and other per-call context in a fixed order.
// Dependencies: basekit-core, async-trait
// ============================================================================

//! ## Overview
//! Processors run in registration order after input validation and identifier
//! coercion. The first processor returning an error aborts the call. The
//! [`SessionProcessor`] is installed by default and attaches the resolved
//! session to the [`RequestContext`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use basekit_core::ApiError;
use basekit_core::SessionStore;
use serde_json::Value;

use crate::context::RequestContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message for a `session` field that is not a usable token.
pub const MALFORMED_SESSION_MESSAGE: &str = "Invalid session.";
/// Message for a token with no stored session.
pub const UNKNOWN_SESSION_MESSAGE: &str = "Not logged on.";

// ============================================================================
// SECTION: Processor Trait
// ============================================================================

/// Cross-cutting hook run before the method body.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    /// Short name recorded in the failure audit when the processor aborts a call.
    fn name(&self) -> &'static str;

    /// Inspects or enriches the context.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] to abort the call.
    async fn process(&self, context: &mut RequestContext) -> Result<(), ApiError>;
}

// ============================================================================
// SECTION: Session Processor
// ============================================================================

/// Resolves the body's `session` token against a [`SessionStore`].
pub struct SessionProcessor {
    /// Session lookup backend.
    store: Arc<dyn SessionStore>,
}

impl SessionProcessor {
    /// Creates a session processor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
        }
    }
}

#[async_trait]
impl RequestProcessor for SessionProcessor {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn process(&self, context: &mut RequestContext) -> Result<(), ApiError> {
        let token = match context.body.get("session") {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::String(token)) if !token.is_empty() => token.clone(),
            Some(_) => return Err(ApiError::invalid_session(MALFORMED_SESSION_MESSAGE)),
        };
        let record = self.store.lookup(&token).await?;
        match record {
            Some(record) => {
                context.session = Some(record);
                Ok(())
            }
            None => Err(ApiError::invalid_session(UNKNOWN_SESSION_MESSAGE)),
        }
    }
}
