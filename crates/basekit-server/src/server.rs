// crates/basekit-server/src/server.rs
// ============================================================================
// Module: API Server
// Description: Registration front end and HTTP/HTTPS transport.
// Purpose: Serve `POST /<method>` calls through the request pipeline.
// Dependencies: axum, axum-server, basekit-config, basekit-contract, tokio
// ============================================================================

//! ## Overview
//! [`ApiServer`] collects entities, methods, and processors; registration
//! failures are returned immediately and are fatal to startup. [`ApiServer::build`]
//! freezes the registry into an [`ApiService`], which routes `POST /{method}`
//! to the [`Pipeline`]. The plain listener marks calls as non-SSL; the
//! optional rustls listener marks them as SSL. Response bodies stream from a
//! bounded channel so large results never sit in memory whole.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::panic;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path as RoutePath;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use axum_server::tls_rustls::RustlsConfig;
use basekit_config::AuditConfig;
use basekit_config::BaseKitConfig;
use basekit_config::ServerConfig;
use basekit_contract::MethodSpec;
use basekit_contract::RegistryBuilder;
use basekit_contract::RegistryError;
use basekit_core::ApiError;
use basekit_core::AuditSink;
use basekit_core::FileAuditSink;
use basekit_core::LifecycleAuditEvent;
use basekit_core::NoopAuditSink;
use basekit_core::SessionStore;
use basekit_core::StderrAuditSink;
use rustls::crypto::CryptoProvider;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::builtin::GET_API_METHOD;
use crate::builtin::GetApi;
use crate::builtin::get_api_spec;
use crate::context::IncomingRequest;
use crate::pipeline::ApiMethod;
use crate::pipeline::Pipeline;
use crate::processors::RequestProcessor;
use crate::processors::SessionProcessor;
use crate::stream::ChannelSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response body channel capacity, in chunks.
const RESPONSE_CHANNEL_CAPACITY: usize = 8;
/// Content type of every response.
const JSON_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server startup and transport errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Entity or method registration failed.
    #[error("registration failed: {0}")]
    Registration(#[from] RegistryError),
    /// Audit sink could not be opened.
    #[error("audit error: {0}")]
    Audit(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Server under construction.
pub struct ApiServer {
    /// Loaded configuration.
    config: BaseKitConfig,
    /// Registry being populated.
    builder: RegistryBuilder,
    /// Method bodies keyed by name.
    methods: BTreeMap<String, Arc<dyn ApiMethod>>,
    /// Request processors in run order.
    processors: Vec<Arc<dyn RequestProcessor>>,
    /// Audit sink shared with the registry and pipeline.
    audit: Arc<dyn AuditSink>,
}

impl ApiServer {
    /// Creates a server with `getAPI` and the session processor installed.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the built-in method fails to register.
    pub fn new(
        config: BaseKitConfig,
        audit: Arc<dyn AuditSink>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, ServerError> {
        let builder = RegistryBuilder::new(config.registry_options(), Arc::clone(&audit));
        let mut server = Self {
            config,
            builder,
            methods: BTreeMap::new(),
            processors: Vec::new(),
            audit,
        };
        server.add_processor(Arc::new(SessionProcessor::new(sessions)));
        server.register_method(GET_API_METHOD, get_api_spec(), Arc::new(GetApi))?;
        Ok(server)
    }

    /// Registers a reusable entity schema.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registration`] when the entity is rejected.
    pub fn register_entity(&mut self, entity: Value) -> Result<(), ServerError> {
        self.builder.register_entity(entity)?;
        Ok(())
    }

    /// Registers a method declaration together with its body.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registration`] when the declaration is rejected.
    pub fn register_method(
        &mut self,
        name: &str,
        spec: MethodSpec,
        body: Arc<dyn ApiMethod>,
    ) -> Result<(), ServerError> {
        self.builder.register_method(name, spec)?;
        self.methods.insert(name.to_string(), body);
        Ok(())
    }

    /// Appends a request processor; processors run in the order added.
    pub fn add_processor(&mut self, processor: Arc<dyn RequestProcessor>) {
        self.processors.push(processor);
    }

    /// Freezes registration and returns the servable API.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registration`] when the snapshot cannot be built.
    pub fn build(self) -> Result<ApiService, ServerError> {
        let registry = Arc::new(self.builder.build()?);
        let pipeline =
            Pipeline::new(registry, self.methods, self.processors, self.config.pipeline, Arc::clone(&self.audit));
        Ok(ApiService {
            pipeline: Arc::new(pipeline),
            server: self.config.server,
            audit: self.audit,
        })
    }
}

// ============================================================================
// SECTION: Serving
// ============================================================================

/// Frozen API ready to serve.
pub struct ApiService {
    /// Shared dispatcher.
    pipeline: Arc<Pipeline>,
    /// Listener settings.
    server: ServerConfig,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn AuditSink>,
}

impl ApiService {
    /// Returns the dispatcher.
    #[must_use]
    pub const fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Builds the router; `ssl` marks every call it serves.
    #[must_use]
    pub fn router(&self, ssl: bool) -> Router {
        let state = Arc::new(TransportState {
            pipeline: Arc::clone(&self.pipeline),
            ssl,
            max_body_bytes: self.server.max_body_bytes,
            idle_timeout: Duration::from_millis(self.server.idle_timeout_ms),
        });
        Router::new()
            .route("/{method}", post(handle_call))
            .layer(DefaultBodyLimit::disable())
            .with_state(state)
    }

    /// Serves plain HTTP on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the server fails.
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().map_err(|err| ServerError::Transport(err.to_string()))?;
        self.audit.record_lifecycle(&LifecycleAuditEvent::new("listening", format!("http://{local}")));
        axum::serve(listener, self.router(false).into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }

    /// Binds the configured listeners and serves until one fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding, TLS setup, or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        if self.server.abort_on_panic {
            install_panic_hook(Arc::clone(&self.audit));
        }
        let bind = self.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let https = self.server.https_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        match (https, self.server.tls.clone()) {
            (Some(addr), Some(tls)) => {
                if CryptoProvider::get_default().is_none() {
                    // A concurrent install wins the race; either provider serves.
                    rustls::crypto::aws_lc_rs::default_provider().install_default().ok();
                }
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(|err| ServerError::Transport(format!("tls setup failed: {err}")))?;
                self.audit.record_lifecycle(&LifecycleAuditEvent::new("listening", format!("https://{addr}")));
                let secure = axum_server::bind_rustls(addr, rustls)
                    .serve(self.router(true).into_make_service_with_connect_info::<SocketAddr>());
                tokio::try_join!(self.serve_listener(listener), async {
                    secure.await.map_err(|_| ServerError::Transport("https server failed".to_string()))
                })?;
                Ok(())
            }
            (Some(_), None) => Err(ServerError::Config("server.https_bind requires server.tls".to_string())),
            (None, _) => self.serve_listener(listener).await,
        }
    }
}

/// Installs a hook that records the panic and aborts the process.
fn install_panic_hook(audit: Arc<dyn AuditSink>) {
    panic::set_hook(Box::new(move |info| {
        audit.record_lifecycle(&LifecycleAuditEvent::new("panic", info.to_string()));
        process::abort();
    }));
}

/// Builds the audit sink described by configuration.
///
/// # Errors
///
/// Returns [`ServerError::Audit`] when the audit file cannot be opened.
pub fn audit_sink_from_config(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path)).map_err(|err| ServerError::Audit(err.to_string()))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: HTTP Handling
// ============================================================================

/// Per-listener handler state.
struct TransportState {
    /// Shared dispatcher.
    pipeline: Arc<Pipeline>,
    /// Whether this listener is the SSL one.
    ssl: bool,
    /// Maximum request body size.
    max_body_bytes: usize,
    /// Idle window for reading the body and sending each chunk.
    idle_timeout: Duration,
}

/// Handles `POST /{method}`.
async fn handle_call(
    State(state): State<Arc<TransportState>>,
    RoutePath(method): RoutePath<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let request = IncomingRequest::new(method, Value::Null).with_ssl(state.ssl).with_peer(peer);
    if !state.pipeline.contains(&request.method) {
        let error = ApiError::not_found(format!("Unknown method: {}.", request.method));
        return respond(&state, StatusCode::NOT_FOUND, request, Some(error));
    }
    let bytes = match read_body(&state, &headers, body).await {
        Ok(bytes) => bytes,
        Err((status, error)) => return respond(&state, status, request, Some(error)),
    };
    match parse_body(&bytes) {
        Ok(value) => respond(&state, StatusCode::OK, IncomingRequest { body: value, ..request }, None),
        Err(error) => respond(&state, StatusCode::BAD_REQUEST, request, Some(error)),
    }
}

/// Reads the request body within the size limit and idle window.
///
/// Oversized bodies map to 413 and bodies not received in time map to 408.
async fn read_body(
    state: &TransportState,
    headers: &HeaderMap,
    body: Body,
) -> Result<Bytes, (StatusCode, ApiError)> {
    let too_large = || {
        let message = format!("Request body exceeds {} bytes.", state.max_body_bytes);
        (StatusCode::PAYLOAD_TOO_LARGE, ApiError::invalid_parameter(message))
    };
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > state.max_body_bytes) {
        return Err(too_large());
    }
    match tokio::time::timeout(state.idle_timeout, axum::body::to_bytes(body, state.max_body_bytes)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(_)) => Err(too_large()),
        Err(_) => Err((
            StatusCode::REQUEST_TIMEOUT,
            ApiError::invalid_parameter("Request body was not received in time."),
        )),
    }
}

/// Parses a request body; an empty body is `null`.
fn parse_body(bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|_| ApiError::invalid_parameter("Request body is not valid JSON."))
}

/// Spawns the pipeline and streams its envelope as the response body.
fn respond(state: &TransportState, status: StatusCode, request: IncomingRequest, rejection: Option<ApiError>) -> Response {
    let (sender, receiver) = mpsc::channel::<Result<Bytes, io::Error>>(RESPONSE_CHANNEL_CAPACITY);
    let pipeline = Arc::clone(&state.pipeline);
    let idle_timeout = state.idle_timeout;
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(sender, idle_timeout);
        match rejection {
            Some(error) => pipeline.reject(request, error, &mut sink).await,
            None => pipeline.dispatch(request, &mut sink).await,
        }
    });
    (status, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], Body::from_stream(ReceiverStream::new(receiver))).into_response()
}
