// crates/basekit-server/tests/common/mod.rs
// =============================================================================
// Module: Server Test Helpers
// Description: Shared methods, harness, and call helpers for pipeline tests.
// Purpose: Reduce duplication across integration tests for basekit-server.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::sync::Arc;

use async_trait::async_trait;
use basekit_config::BaseKitConfig;
use basekit_contract::MethodInfo;
use basekit_contract::MethodSpec;
use basekit_core::ApiError;
use basekit_core::AuditSink;
use basekit_core::DocumentStore;
use basekit_core::ErrorKind;
use basekit_core::InMemoryDocumentStore;
use basekit_core::InMemorySessionStore;
use basekit_core::MemoryAuditSink;
use basekit_core::ObjectId;
use basekit_core::SessionRecord;
use basekit_core::SessionStore;
use basekit_core::Timestamp;
use basekit_server::ApiMethod;
use basekit_server::ApiServer;
use basekit_server::ApiService;
use basekit_server::BufferSink;
use basekit_server::CallReport;
use basekit_server::IncomingRequest;
use basekit_server::RequestContext;
use basekit_server::ResultStream;
use serde_json::Value;
use serde_json::json;

/// Session token known to the harness session store.
pub const KNOWN_TOKEN: &str = "tok-known";
/// User bound to [`KNOWN_TOKEN`].
pub const KNOWN_USER: &str = "54f5a3b2c1d0e9f8a7b6c5d4";

// =============================================================================
// Method Bodies
// =============================================================================

/// Writes every body field back into the result.
pub struct Echo;

#[async_trait]
impl ApiMethod for Echo {
    async fn call(&self, context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        if let Some(fields) = context.body.as_object() {
            for (name, value) in fields {
                out.key(name)?.value(value)?;
            }
        }
        Ok(())
    }
}

/// Fails with the kind named in the body.
pub struct Fail;

#[async_trait]
impl ApiMethod for Fail {
    async fn call(&self, context: &RequestContext, _out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        let kind = context.field("kind").and_then(Value::as_str).unwrap_or("internal");
        Err(ApiError::new(ErrorKind::from_token(kind), "boom"))
    }
}

/// Writes the resolved session's user id.
pub struct WhoAmI;

#[async_trait]
impl ApiMethod for WhoAmI {
    async fn call(&self, context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        let user = context
            .session
            .as_ref()
            .and_then(|session| session.user_id)
            .ok_or_else(|| ApiError::invalid_session("Not logged on."))?;
        out.key("userId")?.value(&user.to_hex())?;
        Ok(())
    }
}

/// Writes the `owner` field as the pipeline left it.
pub struct LinkNote;

#[async_trait]
impl ApiMethod for LinkNote {
    async fn call(&self, context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        out.key("owner")?.value(&context.body["owner"])?;
        Ok(())
    }
}

/// Streams every stored note.
pub struct ListNotes {
    /// Note storage.
    pub store: Arc<InMemoryDocumentStore>,
}

#[async_trait]
impl ApiMethod for ListNotes {
    async fn call(&self, _context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        let notes = self.store.find("notes", &json!({})).await?;
        out.key("notes")?;
        out.write_documents(notes).await
    }
}

/// Writes a result that violates its output schema.
pub struct BadShape;

#[async_trait]
impl ApiMethod for BadShape {
    async fn call(&self, _context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        out.key("count")?.value("many")?;
        Ok(())
    }
}

/// Fails after leaving an open list behind.
pub struct HalfWritten;

#[async_trait]
impl ApiMethod for HalfWritten {
    async fn call(&self, _context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        out.key("items")?.open_list()?.value("a")?;
        Err(ApiError::internal("disk gone"))
    }
}

/// Tries to close the `result` map and the envelope it sits in.
pub struct OverClose;

#[async_trait]
impl ApiMethod for OverClose {
    async fn call(&self, _context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError> {
        out.close()?.close()?;
        Ok(())
    }
}

// =============================================================================
// Declarations
// =============================================================================

/// Returns method info with a description and sample result.
pub fn info(description: &str, sample: Value) -> MethodInfo {
    MethodInfo {
        description: Some(description.to_string()),
        sample_result: Some(sample),
        ..MethodInfo::default()
    }
}

/// Input and output `{msg: string}` schema.
pub fn msg_schema() -> Value {
    json!({"type": "object", "properties": {"msg": {"type": "string"}}, "required": ["msg"]})
}

/// Empty object schema.
pub fn empty_object() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Returns the `echo` declaration.
pub fn echo_spec() -> MethodSpec {
    MethodSpec::new(msg_schema(), msg_schema(), info("Echoes the message back.", json!({"msg": "hi"})))
}

// =============================================================================
// Harness
// =============================================================================

/// Built service plus its observable collaborators.
pub struct Harness {
    /// Servable API.
    pub service: ApiService,
    /// Captured audit events.
    pub audit: Arc<MemoryAuditSink>,
    /// Session store backing the session processor.
    pub sessions: Arc<InMemorySessionStore>,
    /// Note storage for `listNotes`.
    pub notes: Arc<InMemoryDocumentStore>,
}

/// Builds a server with every test method registered.
pub fn harness(config: BaseKitConfig) -> Harness {
    let audit = Arc::new(MemoryAuditSink::new());
    let sink: Arc<dyn AuditSink> = audit.clone();
    let sessions = Arc::new(InMemorySessionStore::new());
    sessions
        .insert(SessionRecord {
            token: KNOWN_TOKEN.to_string(),
            user_id: Some(ObjectId::parse(KNOWN_USER).unwrap()),
            device_id: None,
            created_at: Timestamp::now(),
        })
        .unwrap();
    let store: Arc<dyn SessionStore> = sessions.clone();
    let notes = Arc::new(InMemoryDocumentStore::new());
    let mut server = ApiServer::new(config, sink, store).unwrap();
    server
        .register_entity(json!({"id": "session", "title": "Session", "type": "string"}))
        .unwrap();
    server.register_method("echo", echo_spec(), Arc::new(Echo)).unwrap();

    let mut secure = echo_spec();
    secure.info.as_mut().unwrap().forced_ssl = true;
    server.register_method("secureEcho", secure, Arc::new(Echo)).unwrap();

    let mut fail_info = info("Fails on purpose.", json!({}));
    fail_info.errors.insert("quota_low".to_string(), "Quota is low.".to_string());
    let fail = MethodSpec::new(
        json!({"type": "object", "properties": {"kind": {"type": "string"}}, "required": ["kind"]}),
        empty_object(),
        fail_info,
    );
    server.register_method("fail", fail, Arc::new(Fail)).unwrap();

    let whoami = MethodSpec::new(
        json!({"type": "object", "properties": {"session": {"$ref": "session"}}, "required": ["session"]}),
        json!({"type": "object", "properties": {"userId": {"type": "string", "format": "objectId"}}}),
        info("Returns the logged-in user.", json!({"userId": KNOWN_USER})),
    );
    server.register_method("whoami", whoami, Arc::new(WhoAmI)).unwrap();

    let link = MethodSpec::new(
        json!({
            "type": "object",
            "properties": {"owner": {"type": "string", "format": "objectId"}},
            "required": ["owner"],
        }),
        json!({
            "type": "object",
            "properties": {"owner": {"type": ["string", "object"], "additionalProperties": true}},
        }),
        info("Links a note to its owner.", json!({"owner": KNOWN_USER})),
    );
    server.register_method("linkNote", link, Arc::new(LinkNote)).unwrap();

    let list = MethodSpec::new(
        empty_object(),
        json!({
            "type": "object",
            "properties": {"notes": {"type": "array", "items": {"type": "object", "additionalProperties": true}}},
        }),
        info("Lists stored notes.", json!({"notes": []})),
    );
    server
        .register_method("listNotes", list, Arc::new(ListNotes {
            store: Arc::clone(&notes),
        }))
        .unwrap();

    let bad = MethodSpec::new(
        empty_object(),
        json!({"type": "object", "properties": {"count": {"type": "integer"}}}),
        info("Returns a count.", json!({"count": 1})),
    );
    server.register_method("badShape", bad, Arc::new(BadShape)).unwrap();

    let half = MethodSpec::new(
        empty_object(),
        json!({"type": "object", "properties": {"items": {"type": "array", "items": {"type": "string"}}}}),
        info("Writes items.", json!({"items": ["a"]})),
    );
    server.register_method("halfWritten", half, Arc::new(HalfWritten)).unwrap();

    let over = MethodSpec::new(empty_object(), empty_object(), info("Closes too much.", json!({})));
    server.register_method("overClose", over, Arc::new(OverClose)).unwrap();

    Harness {
        service: server.build().unwrap(),
        audit,
        sessions,
        notes,
    }
}

/// Dispatches a call into a buffer and returns the raw text and report.
pub async fn call_text(service: &ApiService, request: IncomingRequest) -> (String, CallReport) {
    let mut sink = BufferSink::new();
    let report = service.pipeline().dispatch(request, &mut sink).await;
    (sink.text(), report)
}

/// Dispatches a call and parses the envelope.
pub async fn call(service: &ApiService, method: &str, body: Value) -> Value {
    let (text, _) = call_text(service, IncomingRequest::new(method, body)).await;
    serde_json::from_str(&text).unwrap()
}
