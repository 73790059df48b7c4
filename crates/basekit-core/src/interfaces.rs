// crates/basekit-core/src/interfaces.rs
// ============================================================================
// Module: Collaborator Interfaces
// Description: Storage and session lookup traits consumed by the pipeline.
// Purpose: Keep the request pipeline backend-agnostic.
// Dependencies: async-trait, serde, serde_json, tokio-stream
// ============================================================================

//! ## Overview
//! The pipeline reaches storage only through these traits. [`DocumentStore`]
//! covers the document operations method bodies need, with `find` returning a
//! lazy stream that can be forwarded through the result writer item by item.
//! [`SessionStore`] maps session tokens to [`SessionRecord`]s.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_stream::Stream;

use crate::error::ApiError;
use crate::identifiers::ObjectId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Query or update document is malformed.
    #[error("invalid storage query: {0}")]
    InvalidQuery(String),
    /// Backend reported a failure.
    #[error("storage error: {0}")]
    Backend(String),
    /// Record with the same key already exists.
    #[error("storage conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        Self::internal(error.to_string())
    }
}

// ============================================================================
// SECTION: Document Store
// ============================================================================

/// Lazy sequence of documents returned by [`DocumentStore::find`].
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Value, StorageError>> + Send>>;

/// Options for [`DocumentStore::find_and_modify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindAndModifyOptions {
    /// Insert a document built from the query when nothing matches.
    pub upsert: bool,
    /// Return the document after the update instead of before.
    pub return_new: bool,
}

/// Document storage operations used by method bodies.
///
/// Queries are JSON objects matched field by field; updates are either a
/// replacement document or a `{"$set": {...}}` patch.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the first document matching `query`.
    async fn find_one(&self, collection: &str, query: &Value) -> Result<Option<Value>, StorageError>;

    /// Returns all documents matching `query` as a lazy stream.
    async fn find(&self, collection: &str, query: &Value) -> Result<DocumentStream, StorageError>;

    /// Atomically updates the first match and returns it.
    async fn find_and_modify(
        &self,
        collection: &str,
        query: &Value,
        update: &Value,
        options: FindAndModifyOptions,
    ) -> Result<Option<Value>, StorageError>;

    /// Inserts a document, assigning `_id` when absent, and returns it.
    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StorageError>;

    /// Updates every match and returns the number of documents changed.
    async fn update(&self, collection: &str, query: &Value, update: &Value) -> Result<u64, StorageError>;

    /// Removes every match and returns the number of documents removed.
    async fn remove(&self, collection: &str, query: &Value) -> Result<u64, StorageError>;
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Resolved login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque session token supplied by clients.
    pub token: String,
    /// Logged-in user when the session is bound to one.
    pub user_id: Option<ObjectId>,
    /// Device the session was opened from.
    pub device_id: Option<String>,
    /// Session creation time.
    pub created_at: Timestamp,
}

/// Session lifecycle storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session for `token`, or `None` when unknown.
    async fn lookup(&self, token: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] when the token is already in use.
    async fn create(&self, record: SessionRecord) -> Result<(), StorageError>;

    /// Removes the session for `token`, returning whether it existed.
    async fn remove(&self, token: &str) -> Result<bool, StorageError>;

    /// Removes every session of `user_id`; with `device_id`, only that
    /// device's sessions. Returns the number removed.
    async fn remove_for_user(&self, user_id: ObjectId, device_id: Option<&str>) -> Result<u64, StorageError>;
}
