// crates/basekit-server/src/pipeline.rs
// ============================================================================
// Module: Request Pipeline
// Description: Ordered per-call stages from SSL check to envelope.
// Purpose: Run every API call through the same checks and report uniformly.
// Dependencies: basekit-config, basekit-contract, basekit-core
// ============================================================================

//! ## Overview
//! [`Pipeline::dispatch`] opens the response envelope, then runs the stages of
//! [`Stage::ORDER`] one after another. The first failing stage skips the rest.
//! Finalization always closes the `result` map and writes the `status` object.
//! Error kinds the method never declared reach the client as `internal`; the
//! true cause goes to the audit sink with the request body, passwords masked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use basekit_config::PipelineConfig;
use basekit_contract::ApiRegistry;
use basekit_contract::MethodDescriptor;
use basekit_core::ApiError;
use basekit_core::AuditSink;
use basekit_core::ErrorKind;
use basekit_core::FailureAuditEvent;
use basekit_core::RequestAuditEvent;
use basekit_core::RequestAuditEventParams;
use basekit_core::STATUS_OK;
use basekit_core::WriterError;
use basekit_core::WriterState;
use basekit_core::fingerprint;
use basekit_core::mask_passwords;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::context::IncomingRequest;
use crate::context::RequestContext;
use crate::processors::RequestProcessor;
use crate::stream::ChunkSink;
use crate::stream::ResultStream;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Writer depth with only the envelope map open.
const ENVELOPE_DEPTH: usize = 1;
/// Writer depth with the envelope and `result` maps open.
const RESULT_DEPTH: usize = 2;
/// Message for a missing request body.
pub const EMPTY_REQUEST_MESSAGE: &str = "Request is empty.";
/// Message for an SSL-only method called over plain HTTP.
pub const SSL_REQUIRED_MESSAGE: &str = "SSL connection required for this method.";

// ============================================================================
// SECTION: Method Bodies
// ============================================================================

/// Implementation of one registered API method.
#[async_trait]
pub trait ApiMethod: Send + Sync {
    /// Writes the method result into `out`, whose `result` map is already open.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] to fail the call.
    async fn call(&self, context: &RequestContext, out: &mut ResultStream<'_>) -> Result<(), ApiError>;
}

// ============================================================================
// SECTION: Stages
// ============================================================================

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reject plain connections for SSL-only methods.
    Ssl,
    /// Validate the body against the input schema.
    Input,
    /// Rewrite identifier fields to native form.
    IdCoercion,
    /// Run request processors in order.
    Processors,
    /// Run the method body.
    Invoke,
    /// Validate the captured result against the output schema.
    OutputValidation,
}

impl Stage {
    /// Stages in execution order.
    pub const ORDER: [Self; 6] =
        [Self::Ssl, Self::Input, Self::IdCoercion, Self::Processors, Self::Invoke, Self::OutputValidation];
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Status object written at the end of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStatus {
    /// `ok` or the reported error kind.
    pub error: String,
    /// Empty on success; the reported message otherwise.
    pub error_message: String,
}

impl WireStatus {
    /// Success status.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            error: STATUS_OK.to_string(),
            error_message: String::new(),
        }
    }
}

/// Outcome of one dispatched call.
#[derive(Debug, Clone)]
pub struct CallReport {
    /// Status written to the client.
    pub status: WireStatus,
    /// Error raised inside the pipeline, before any downgrade.
    pub cause: Option<ApiError>,
    /// Transport failure while writing the response.
    pub transport_error: Option<WriterError>,
}

impl CallReport {
    /// Returns true when the client saw `ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.error == STATUS_OK
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Dispatcher over a frozen registry and its method bodies.
pub struct Pipeline {
    /// Frozen registry.
    registry: Arc<ApiRegistry>,
    /// Method bodies keyed by method name.
    methods: BTreeMap<String, Arc<dyn ApiMethod>>,
    /// Request processors in run order.
    processors: Vec<Arc<dyn RequestProcessor>>,
    /// Stage switches.
    config: PipelineConfig,
    /// Audit sink for request and failure events.
    audit: Arc<dyn AuditSink>,
}

impl Pipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        registry: Arc<ApiRegistry>,
        methods: BTreeMap<String, Arc<dyn ApiMethod>>,
        processors: Vec<Arc<dyn RequestProcessor>>,
        config: PipelineConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            methods,
            processors,
            config,
            audit,
        }
    }

    /// Returns the frozen registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ApiRegistry> {
        &self.registry
    }

    /// Returns true when `method` is registered.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.registry.method(method).is_some()
    }

    /// Runs one call and streams its envelope into `sink`.
    pub async fn dispatch(&self, request: IncomingRequest, sink: &mut dyn ChunkSink) -> CallReport {
        let Some(descriptor) = self.registry.method(&request.method) else {
            let error = ApiError::not_found(format!("Unknown method: {}.", request.method));
            return self.reject(request, error, sink).await;
        };
        let mut context = RequestContext::new(request, Arc::clone(&self.registry));
        let mut out = ResultStream::new(sink, self.config.debug_output_validation);
        let outcome = match open_envelope(&mut out) {
            Ok(offset) => self.run_stages(descriptor, &mut context, &mut out, offset).await,
            Err(error) => Err(error.into()),
        };
        self.finalize(Some(descriptor), &context, &mut out, outcome).await
    }

    /// Writes an error envelope without running any stage.
    pub async fn reject(&self, request: IncomingRequest, error: ApiError, sink: &mut dyn ChunkSink) -> CallReport {
        let context = RequestContext::new(request, Arc::clone(&self.registry));
        let mut out = ResultStream::new(sink, false);
        let outcome = match open_envelope(&mut out) {
            Ok(_) => Err(error),
            Err(writer) => Err(writer.into()),
        };
        self.finalize(None, &context, &mut out, outcome).await
    }

    /// Runs every stage in order, flushing after each.
    async fn run_stages(
        &self,
        descriptor: &MethodDescriptor,
        context: &mut RequestContext,
        out: &mut ResultStream<'_>,
        offset: usize,
    ) -> Result<(), ApiError> {
        for stage in Stage::ORDER {
            self.run_stage(stage, descriptor, context, out, offset).await?;
            out.flush().await?;
        }
        Ok(())
    }

    /// Runs one stage.
    async fn run_stage(
        &self,
        stage: Stage,
        descriptor: &MethodDescriptor,
        context: &mut RequestContext,
        out: &mut ResultStream<'_>,
        offset: usize,
    ) -> Result<(), ApiError> {
        match stage {
            Stage::Ssl => {
                if descriptor.forced_ssl() && !context.ssl {
                    return Err(ApiError::ssl_required(SSL_REQUIRED_MESSAGE));
                }
                Ok(())
            }
            Stage::Input => {
                if context.body.is_null() {
                    return Err(ApiError::invalid_parameter(EMPTY_REQUEST_MESSAGE));
                }
                self.registry.validators().validate_input(&context.body, descriptor.input_schema())
            }
            Stage::IdCoercion => {
                if self.config.object_id_parsing {
                    descriptor.id_plan().apply(&mut context.body)?;
                }
                Ok(())
            }
            Stage::Processors => {
                for processor in &self.processors {
                    processor.process(context).await.map_err(|error| tag_processor(error, processor.name()))?;
                }
                Ok(())
            }
            Stage::Invoke => {
                let method = self
                    .methods
                    .get(descriptor.name())
                    .ok_or_else(|| ApiError::from_kind(ErrorKind::NotImplemented))?;
                method.call(context, out).await
            }
            Stage::OutputValidation => {
                if !self.config.debug_output_validation {
                    return Ok(());
                }
                settle(out, RESULT_DEPTH)?;
                let text = out
                    .captured_from(offset)
                    .ok_or_else(|| ApiError::internal("Result capture is unavailable."))?;
                let result: Value = serde_json::from_str(&format!("{text}}}"))
                    .map_err(|_| ApiError::internal("Result is not valid JSON."))?;
                self.registry.validators().validate_output(&result, descriptor.output_schema())
            }
        }
    }

    /// Closes the envelope, writes the status, and records audit events.
    async fn finalize(
        &self,
        descriptor: Option<&MethodDescriptor>,
        context: &RequestContext,
        out: &mut ResultStream<'_>,
        outcome: Result<(), ApiError>,
    ) -> CallReport {
        let status = match &outcome {
            Ok(()) => WireStatus::ok(),
            Err(error) => wire_status(descriptor, error),
        };
        if let Err(error) = &outcome {
            self.audit.record_failure(&FailureAuditEvent::new(
                context.method.clone(),
                error.kind.clone(),
                error.message.clone(),
                error.context.clone(),
                mask_passwords(&context.body),
            ));
        }
        let transport_error = close_envelope(out, &status).await.err();
        self.audit.record_request(&RequestAuditEvent::new(RequestAuditEventParams {
            method: context.method.clone(),
            peer_ip: context.peer.map(|peer| peer.ip().to_string()),
            ssl: context.ssl,
            session: context.session_token().map(fingerprint),
            user_id: context.session.as_ref().and_then(|session| session.user_id).map(|id| id.to_hex()),
            status: status.error.clone(),
            duration_ms: context.elapsed_ms(),
        }));
        CallReport {
            status,
            cause: outcome.err(),
            transport_error,
        }
    }
}

// ============================================================================
// SECTION: Envelope Helpers
// ============================================================================

/// Writes `{"result":{` and returns the capture offset of the result map.
///
/// The envelope and `result` maps stay out of reach of method bodies until
/// [`close_envelope`] runs.
fn open_envelope(out: &mut ResultStream<'_>) -> Result<usize, WriterError> {
    out.open_map()?.key("result")?;
    let offset = out.captured_len();
    out.open_map()?;
    out.set_floor(RESULT_DEPTH);
    Ok(offset)
}

/// Closes containers down to `depth` and fills a dangling key with `null`.
fn settle(out: &mut ResultStream<'_>, depth: usize) -> Result<(), WriterError> {
    out.unwind_to(depth)?;
    if out.state() == WriterState::AwaitingValue {
        out.raw("null")?;
    }
    Ok(())
}

/// Closes the result map, writes the status, and flushes.
async fn close_envelope(out: &mut ResultStream<'_>, status: &WireStatus) -> Result<(), WriterError> {
    out.set_floor(0);
    if out.depth() >= ENVELOPE_DEPTH {
        settle(out, RESULT_DEPTH)?;
        if out.depth() == RESULT_DEPTH {
            out.close()?;
        }
        out.key("status")?.value(status)?.close()?;
    }
    out.flush().await
}

/// Records which processor aborted the call in the error context.
fn tag_processor(mut error: ApiError, name: &'static str) -> ApiError {
    match error.context.as_mut() {
        Some(Value::Object(fields)) => {
            fields.insert("processor".to_string(), Value::from(name));
            error
        }
        Some(other) => {
            let detail = other.take();
            error.with_context(json!({"processor": name, "detail": detail}))
        }
        None => error.with_context(json!({"processor": name})),
    }
}

/// Maps a pipeline error to the status the client may see.
fn wire_status(descriptor: Option<&MethodDescriptor>, error: &ApiError) -> WireStatus {
    match descriptor {
        Some(descriptor) if !descriptor.declares(&error.kind) => WireStatus {
            error: ErrorKind::Internal.as_str().to_string(),
            error_message: format!("Unexpected error: {}", error.kind),
        },
        Some(descriptor) if error.message.is_empty() => WireStatus {
            error: error.kind.as_str().to_string(),
            error_message: descriptor
                .info()
                .errors
                .get(error.kind.as_str())
                .cloned()
                .unwrap_or_else(|| error.kind.default_message().to_string()),
        },
        _ => WireStatus {
            error: error.kind.as_str().to_string(),
            error_message: error.message.clone(),
        },
    }
}
