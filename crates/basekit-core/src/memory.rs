// crates/basekit-core/src/memory.rs
// ============================================================================
// Module: In-Memory Stores
// Description: Process-local document and session stores.
// Purpose: Back tests and local runs without an external database.
// Dependencies: async-trait, serde_json, tokio-stream
// ============================================================================

//! ## Overview
//! [`InMemoryDocumentStore`] keeps collections as vectors of JSON documents
//! and supports equality queries plus `$set` patches.
//! [`InMemorySessionStore`] is a token-keyed map supporting the full session
//! lifecycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::identifiers::ObjectId;
use crate::interfaces::DocumentStore;
use crate::interfaces::DocumentStream;
use crate::interfaces::FindAndModifyOptions;
use crate::interfaces::SessionRecord;
use crate::interfaces::SessionStore;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Document identifier field.
const ID_FIELD: &str = "_id";
/// Patch operator supported by updates.
const SET_OPERATOR: &str = "$set";

// ============================================================================
// SECTION: Document Store
// ============================================================================

/// In-memory document store.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    /// Collections keyed by name.
    collections: Mutex<BTreeMap<String, Vec<Value>>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the collection map.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<Value>>>, StorageError> {
        self.collections
            .lock()
            .map_err(|_| StorageError::Backend("document store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(&self, collection: &str, query: &Value) -> Result<Option<Value>, StorageError> {
        let query = query_fields(query)?;
        let guard = self.lock()?;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, query)))
            .cloned())
    }

    async fn find(&self, collection: &str, query: &Value) -> Result<DocumentStream, StorageError> {
        let query = query_fields(query)?;
        let matched: Vec<Value> = {
            let guard = self.lock()?;
            guard
                .get(collection)
                .map(|docs| docs.iter().filter(|doc| matches(doc, query)).cloned().collect())
                .unwrap_or_default()
        };
        Ok(Box::pin(tokio_stream::iter(matched.into_iter().map(Ok))))
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        query: &Value,
        update: &Value,
        options: FindAndModifyOptions,
    ) -> Result<Option<Value>, StorageError> {
        let fields = query_fields(query)?;
        let mut guard = self.lock()?;
        let docs = guard.entry(collection.to_string()).or_default();
        if let Some(doc) = docs.iter_mut().find(|doc| matches(doc, fields)) {
            let before = doc.clone();
            apply_update(doc, update)?;
            return Ok(Some(if options.return_new { doc.clone() } else { before }));
        }
        if !options.upsert {
            return Ok(None);
        }
        let mut created = Value::Object(
            fields.iter().filter(|(key, _)| !key.starts_with('$')).map(|(k, v)| (k.clone(), v.clone())).collect(),
        );
        apply_update(&mut created, update)?;
        assign_id(&mut created)?;
        docs.push(created.clone());
        Ok(options.return_new.then_some(created))
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StorageError> {
        let mut document = document;
        assign_id(&mut document)?;
        let mut guard = self.lock()?;
        guard.entry(collection.to_string()).or_default().push(document.clone());
        Ok(document)
    }

    async fn update(&self, collection: &str, query: &Value, update: &Value) -> Result<u64, StorageError> {
        let fields = query_fields(query)?;
        let mut guard = self.lock()?;
        let mut changed = 0_u64;
        if let Some(docs) = guard.get_mut(collection) {
            for doc in docs.iter_mut().filter(|doc| matches(doc, fields)) {
                apply_update(doc, update)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn remove(&self, collection: &str, query: &Value) -> Result<u64, StorageError> {
        let fields = query_fields(query)?;
        let mut guard = self.lock()?;
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !matches(doc, fields));
        Ok(u64::try_from(before - docs.len()).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// In-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    /// Sessions keyed by token.
    sessions: Mutex<BTreeMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces a session without awaiting; used to seed fixtures.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] when the store lock is poisoned.
    pub fn insert(&self, record: SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.insert(record.token.clone(), record);
        Ok(())
    }

    /// Locks the session map.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, SessionRecord>>, StorageError> {
        self.sessions
            .lock()
            .map_err(|_| StorageError::Backend("session store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lookup(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.get(token).cloned())
    }

    async fn create(&self, record: SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&record.token) {
            return Err(StorageError::Conflict("session token already exists".to_string()));
        }
        guard.insert(record.token.clone(), record);
        Ok(())
    }

    async fn remove(&self, token: &str) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard.remove(token).is_some())
    }

    async fn remove_for_user(&self, user_id: ObjectId, device_id: Option<&str>) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.len();
        guard.retain(|_, record| {
            let same_user = record.user_id == Some(user_id);
            let same_device = device_id.is_none_or(|device| record.device_id.as_deref() == Some(device));
            !(same_user && same_device)
        });
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the fields of an object query.
fn query_fields(query: &Value) -> Result<&Map<String, Value>, StorageError> {
    query
        .as_object()
        .ok_or_else(|| StorageError::InvalidQuery("query must be an object".to_string()))
}

/// Returns true when every query field equals the document field.
fn matches(doc: &Value, query: &Map<String, Value>) -> bool {
    query.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

/// Applies a replacement document or a `$set` patch.
fn apply_update(doc: &mut Value, update: &Value) -> Result<(), StorageError> {
    let patch = update
        .as_object()
        .ok_or_else(|| StorageError::InvalidQuery("update must be an object".to_string()))?;
    let Some(target) = doc.as_object_mut() else {
        return Err(StorageError::Backend("stored document is not an object".to_string()));
    };
    if let Some(set) = patch.get(SET_OPERATOR) {
        if patch.len() != 1 {
            return Err(StorageError::InvalidQuery("cannot mix $set with other fields".to_string()));
        }
        let set = set
            .as_object()
            .ok_or_else(|| StorageError::InvalidQuery("$set must be an object".to_string()))?;
        for (key, value) in set {
            target.insert(key.clone(), value.clone());
        }
        return Ok(());
    }
    if let Some(operator) = patch.keys().find(|key| key.starts_with('$')) {
        return Err(StorageError::InvalidQuery(format!("unsupported update operator: {operator}")));
    }
    let id = target.remove(ID_FIELD);
    target.clear();
    target.extend(patch.iter().map(|(key, value)| (key.clone(), value.clone())));
    if let Some(id) = id {
        target.insert(ID_FIELD.to_string(), id);
    }
    Ok(())
}

/// Assigns a generated `_id` in native form when the document lacks one.
fn assign_id(doc: &mut Value) -> Result<(), StorageError> {
    let Some(target) = doc.as_object_mut() else {
        return Err(StorageError::InvalidQuery("document must be an object".to_string()));
    };
    if !target.contains_key(ID_FIELD) {
        target.insert(ID_FIELD.to_string(), ObjectId::generate().to_native());
    }
    Ok(())
}
