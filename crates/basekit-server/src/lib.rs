// crates/basekit-server/src/lib.rs
// ============================================================================
// Module: BaseKit Server Library
// Description: Request pipeline, processors, and HTTP transport.
// Purpose: Serve registered API methods over HTTP and HTTPS.
// Dependencies: crate::{builtin, context, pipeline, processors, server, sessions, stream}
// ============================================================================

//! ## Overview
//! Every call follows one path: the transport builds an [`IncomingRequest`],
//! the [`Pipeline`] runs its ordered stages, and the method body streams its
//! result through a [`ResultStream`]. The envelope is always completed, even
//! when a stage fails part-way through the result.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod builtin;
pub mod context;
pub mod pipeline;
pub mod processors;
pub mod server;
pub mod sessions;
pub mod stream;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builtin::GET_API_METHOD;
pub use builtin::GetApi;
pub use builtin::get_api_spec;
pub use context::IncomingRequest;
pub use context::RequestContext;
pub use pipeline::ApiMethod;
pub use pipeline::CallReport;
pub use pipeline::Pipeline;
pub use pipeline::Stage;
pub use pipeline::WireStatus;
pub use processors::RequestProcessor;
pub use processors::SessionProcessor;
pub use server::ApiServer;
pub use server::ApiService;
pub use server::ServerError;
pub use server::audit_sink_from_config;
pub use sessions::LoginRequest;
pub use sessions::SessionManager;
pub use stream::BufferSink;
pub use stream::ChannelSink;
pub use stream::ChunkSink;
pub use stream::ResultStream;
