// crates/basekit-contract/tests/common/mod.rs
// =============================================================================
// Module: Contract Test Helpers
// Description: Shared fixtures for registry and validator tests.
// Purpose: Reduce duplication across integration tests for basekit-contract.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::sync::Arc;

use basekit_contract::MethodInfo;
use basekit_contract::MethodSpec;
use basekit_contract::RegistryBuilder;
use basekit_contract::RegistryOptions;
use basekit_core::AuditSink;
use basekit_core::MemoryAuditSink;
use serde_json::Value;
use serde_json::json;

/// Returns a builder with default options and an in-memory audit sink.
pub fn builder() -> (RegistryBuilder, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let sink: Arc<dyn AuditSink> = audit.clone();
    (RegistryBuilder::new(RegistryOptions::default(), sink), audit)
}

/// Returns method info with a description and sample result.
pub fn info(description: &str, sample: Value) -> MethodInfo {
    MethodInfo {
        description: Some(description.to_string()),
        sample_result: Some(sample),
        ..MethodInfo::default()
    }
}

/// Returns the `echo` method declaration.
pub fn echo_spec() -> MethodSpec {
    MethodSpec::new(
        json!({"type": "object", "properties": {"msg": {"type": "string"}}, "required": ["msg"]}),
        json!({"type": "object", "properties": {"msg": {"type": "string"}}, "required": ["msg"]}),
        info("Echoes the message back.", json!({"msg": "hi"})),
    )
}

/// Returns the `session` entity.
pub fn session_entity() -> Value {
    json!({
        "id": "session",
        "title": "Session",
        "type": "string",
        "description": "Session token issued at login.",
    })
}

/// Returns a declaration whose input carries a top-level `session` field.
pub fn session_spec() -> MethodSpec {
    MethodSpec::new(
        json!({
            "type": "object",
            "properties": {"session": {"$ref": "session"}},
            "required": ["session"],
        }),
        json!({"type": "object", "properties": {}}),
        info("Returns nothing for a logged-in user.", json!({})),
    )
}
