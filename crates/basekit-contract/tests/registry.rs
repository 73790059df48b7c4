//! Method and entity registration tests for basekit-contract.
// crates/basekit-contract/tests/registry.rs
// =============================================================================
// Module: Registry Tests
// Description: Admission checks, error catalog merging, and snapshots.
// Purpose: Ensure registration fails closed and publishes a stable snapshot.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only registry assertions."
)]

mod common;

use basekit_contract::MetadataError;
use basekit_contract::MethodInfo;
use basekit_contract::MethodSpec;
use basekit_contract::RegistryError;
use basekit_core::ErrorKind;
use serde_json::Value;
use serde_json::json;

use crate::common::builder;
use crate::common::echo_spec;
use crate::common::info;
use crate::common::session_entity;
use crate::common::session_spec;

fn metadata_error(result: Result<(), RegistryError>) -> MetadataError {
    match result {
        Err(RegistryError::InvalidMetadata {
            source, ..
        }) => source,
        other => panic!("expected metadata failure, got {other:?}"),
    }
}

#[test]
fn duplicate_method_is_rejected_and_first_descriptor_kept() {
    let (mut builder, _) = builder();
    builder.register_method("echo", echo_spec()).unwrap();
    let mut replacement = echo_spec();
    replacement.info.as_mut().unwrap().description = Some("Replacement.".to_string());
    let result = builder.register_method("echo", replacement);
    assert_eq!(result, Err(RegistryError::DuplicateMethod("echo".to_string())));
    let kept = builder.method("echo").unwrap();
    assert_eq!(kept.info().description.as_deref(), Some("Echoes the message back."));
}

#[test]
fn reserved_marker_in_name_or_declaration_is_rejected() {
    let (mut builder, _) = builder();
    assert!(matches!(builder.register_method("__hidden", echo_spec()), Err(RegistryError::ReservedMarker(_))));
    let mut spec = echo_spec();
    spec.info.as_mut().unwrap().description = Some("uses __proto".to_string());
    assert!(matches!(builder.register_method("leaky", spec), Err(RegistryError::ReservedMarker(_))));
    assert!(builder.method("leaky").is_none());
}

#[test]
fn missing_info_is_rejected() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.info = None;
    assert_eq!(metadata_error(builder.register_method("echo", spec)), MetadataError::MissingInfo);
}

#[test]
fn missing_description_is_rejected() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.info.as_mut().unwrap().description = None;
    assert_eq!(metadata_error(builder.register_method("echo", spec)), MetadataError::MissingDescription);
}

#[test]
fn invalid_input_schema_is_rejected() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.input = json!({"type": "object", "properties": {"msg": {"description": "untyped"}}});
    assert!(matches!(metadata_error(builder.register_method("echo", spec)), MetadataError::InvalidInput(_)));
}

#[test]
fn invalid_output_schema_is_rejected() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.output = json!({"type": "object", "properties": {"items": {"type": "array"}}});
    assert!(matches!(metadata_error(builder.register_method("echo", spec)), MetadataError::InvalidOutput(_)));
}

#[test]
fn sample_result_must_match_output() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.info.as_mut().unwrap().sample_result = Some(json!({"msg": 5}));
    assert!(matches!(
        metadata_error(builder.register_method("echo", spec)),
        MetadataError::SampleResultMismatch(_)
    ));
    let mut spec = echo_spec();
    spec.info.as_mut().unwrap().sample_result = None;
    assert_eq!(metadata_error(builder.register_method("echo", spec)), MetadataError::MissingSampleResult);
}

#[test]
fn failed_metadata_check_leaves_catalog_untouched() {
    let (mut builder, audit) = builder();
    let before = builder.errors().clone();
    let mut spec = echo_spec();
    spec.info.as_mut().unwrap().errors.insert("weak_password".to_string(), "Too weak.".to_string());
    spec.info.as_mut().unwrap().sample_result = Some(json!({}));
    assert!(builder.register_method("echo", spec).is_err());
    assert_eq!(builder.errors(), &before);
    let events = audit.events_named("registration");
    assert_eq!(events.last().unwrap()["accepted"], json!(false));
}

#[test]
fn metadata_check_augments_baseline_errors() {
    let (builder, _) = builder();
    let info = builder.check_method_metadata(&echo_spec()).unwrap();
    for kind in ["internal", "ssl_required", "invalid_parameter", "not_allowed", "no_right"] {
        assert!(info.errors.contains_key(kind), "missing {kind}");
    }
    assert_eq!(info.errors["no_right"], "User has no right for this action.");
    assert!(!info.errors.contains_key("invalid_session"));
}

#[test]
fn session_input_declares_invalid_session() {
    let (mut builder, _) = builder();
    builder.register_entity(session_entity()).unwrap();
    builder.register_method("whoami", session_spec()).unwrap();
    let descriptor = builder.method("whoami").unwrap();
    assert!(descriptor.declares(&ErrorKind::InvalidSession));
    assert_eq!(builder.errors().message(&ErrorKind::InvalidSession), Some("Session is unknown or expired."));
}

#[test]
fn declared_errors_register_first_write_wins() {
    let (mut builder, _) = builder();
    let mut first = echo_spec();
    first.info.as_mut().unwrap().errors.insert("weak_password".to_string(), "Password is too weak.".to_string());
    let mut second = echo_spec();
    second.info.as_mut().unwrap().errors.insert("weak_password".to_string(), "Other.".to_string());
    builder.register_method("setPassword", first).unwrap();
    builder.register_method("resetPassword", second).unwrap();
    let kind = ErrorKind::from_token("weak_password");
    assert_eq!(builder.errors().message(&kind), Some("Password is too weak."));
    assert_eq!(builder.method("resetPassword").unwrap().info().errors["weak_password"], "Other.");
}

#[test]
fn invalid_declared_error_kind_is_rejected() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.info.as_mut().unwrap().errors.insert("ok".to_string(), String::new());
    assert_eq!(
        metadata_error(builder.register_method("echo", spec)),
        MetadataError::InvalidErrorKind("ok".to_string())
    );
}

#[test]
fn entity_requires_id_and_title() {
    let (mut builder, _) = builder();
    assert_eq!(
        builder.register_entity(json!({"title": "Nameless", "type": "string"})),
        Err(RegistryError::MissingEntityField("id"))
    );
    assert_eq!(
        builder.register_entity(json!({"id": "nameless", "type": "string"})),
        Err(RegistryError::MissingEntityField("title"))
    );
}

#[test]
fn duplicate_entity_is_rejected() {
    let (mut builder, _) = builder();
    builder.register_entity(session_entity()).unwrap();
    assert_eq!(builder.register_entity(session_entity()), Err(RegistryError::DuplicateEntity("session".to_string())));
}

#[test]
fn entity_must_be_valid_schema() {
    let (mut builder, _) = builder();
    let result = builder.register_entity(json!({"id": "loose", "title": "Loose", "properties": {}}));
    assert!(matches!(result, Err(RegistryError::InvalidEntity { .. })));
    assert!(!builder.entities().contains("loose"));
}

#[test]
fn entity_references_resolve_transitively_and_recursively() {
    let (mut builder, _) = builder();
    builder
        .register_entity(json!({
            "id": "node",
            "title": "Node",
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "children": {"type": "array", "items": {"$ref": "node"}},
            },
            "required": ["name"],
        }))
        .unwrap();
    builder
        .register_entity(json!({
            "id": "tree",
            "title": "Tree",
            "type": "object",
            "properties": {"root": {"$ref": "node"}},
        }))
        .unwrap();
    let spec = MethodSpec::new(
        json!({"type": "object", "properties": {"tree": {"$ref": "tree"}}}),
        json!({"type": "object", "properties": {"count": {"type": "integer"}}}),
        info("Counts nodes.", json!({"count": 1})),
    );
    builder.register_method("countNodes", spec).unwrap();
    let registry = builder.build().unwrap();
    let descriptor = registry.method("countNodes").unwrap();
    let good = json!({"tree": {"root": {"name": "a", "children": [{"name": "b", "children": []}]}}});
    let bad = json!({"tree": {"root": {"name": "a", "children": [{"children": []}]}}});
    let validators = registry.validators();
    assert!(validators.validate_input(&good, descriptor.input_schema()).is_ok());
    assert!(validators.validate_input(&bad, descriptor.input_schema()).is_err());
}

#[test]
fn method_referencing_unknown_entity_is_rejected() {
    let (mut builder, _) = builder();
    let err = metadata_error(builder.register_method("whoami", session_spec()));
    assert!(matches!(err, MetadataError::InvalidInput(_)));
}

#[test]
fn snapshot_publishes_methods_entities_and_errors() {
    let (mut builder, _) = builder();
    builder.register_entity(session_entity()).unwrap();
    builder.register_method("echo", echo_spec()).unwrap();
    builder.register_method("whoami", session_spec()).unwrap();
    let registry = builder.build().unwrap();
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.version, "0.9");
    assert_eq!(snapshot.methods.keys().cloned().collect::<Vec<_>>(), vec!["echo", "whoami"]);
    assert!(snapshot.entities.contains_key("session"));
    assert_eq!(snapshot.errors["invalid_session"], "Session is unknown or expired.");

    let text = registry.snapshot_text();
    let methods: Value = serde_json::from_str(&text.methods).unwrap();
    assert_eq!(methods["echo"]["info"]["description"], json!("Echoes the message back."));
    assert_eq!(methods["echo"]["info"]["sampleResult"], json!({"msg": "hi"}));
    let version: Value = serde_json::from_str(&text.version).unwrap();
    assert_eq!(version, json!("0.9"));
}

#[test]
fn registry_keeps_its_own_copy_of_schemas() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    builder.register_method("echo", spec.clone()).unwrap();
    spec.input["properties"]["msg"]["type"] = json!("integer");
    let registry = builder.build().unwrap();
    let descriptor = registry.method("echo").unwrap();
    assert_eq!(descriptor.contract().input["properties"]["msg"]["type"], json!("string"));
}

#[test]
fn forced_ssl_is_published() {
    let (mut builder, _) = builder();
    let mut spec = echo_spec();
    spec.info = Some(MethodInfo {
        forced_ssl: true,
        ..spec.info.unwrap()
    });
    builder.register_method("secureEcho", spec).unwrap();
    let registry = builder.build().unwrap();
    assert!(registry.method("secureEcho").unwrap().forced_ssl());
    let methods: Value = serde_json::from_str(&registry.snapshot_text().methods).unwrap();
    assert_eq!(methods["secureEcho"]["info"]["forcedSSL"], json!(true));
}
