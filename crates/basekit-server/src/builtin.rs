// crates/basekit-server/src/builtin.rs
// ============================================================================
// Module: Built-in Methods
// Description: Introspection method served by every BaseKit server.
// Purpose: Publish the registry snapshot for SDK generators and docs.
// Dependencies: basekit-contract, async-trait
// ============================================================================

//! ## Overview
//! `getAPI` streams the pre-serialized registry snapshot: version, methods,
//! entities, and the error catalog. It accepts an optional `session` so
//! generators that log in first can pass their token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use basekit_contract::MethodInfo;
use basekit_contract::MethodSpec;
use basekit_core::ApiError;
use serde_json::json;

use crate::context::RequestContext;
use crate::pipeline::ApiMethod;
use crate::stream::ResultStream;

// ============================================================================
// SECTION: getAPI
// ============================================================================

/// Reserved introspection method name.
pub const GET_API_METHOD: &str = "getAPI";

/// Returns the `getAPI` declaration.
#[must_use]
pub fn get_api_spec() -> MethodSpec {
    let input = json!({
        "type": "object",
        "properties": {"session": {"type": "string"}},
    });
    let output = json!({
        "type": "object",
        "properties": {
            "version": {"type": "string"},
            "methods": {"type": "object", "additionalProperties": {"type": "object", "additionalProperties": true}},
            "entities": {"type": "object", "additionalProperties": true},
            "errors": {"type": "object", "additionalProperties": {"type": "string", "minLength": 0}},
        },
        "required": ["version", "methods", "entities", "errors"],
    });
    let info = MethodInfo {
        description: Some("Returns the registered methods, entities, and error catalog.".to_string()),
        sample_result: Some(json!({
            "version": "0.9",
            "methods": {},
            "entities": {},
            "errors": {"internal": "Internal server error occurred."},
        })),
        ..MethodInfo::default()
    };
    MethodSpec::new(input, output, info)
}

/// `getAPI` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetApi;

#[async_trait]
impl ApiMethod for GetApi {
    async fn call(&self, context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        let text = context.registry.snapshot_text();
        out.key("version")?.raw(&text.version)?;
        out.key("methods")?.raw(&text.methods)?;
        out.flush().await?;
        out.key("entities")?.raw(&text.entities)?;
        out.key("errors")?.raw(&text.errors)?;
        Ok(())
    }
}
