// crates/basekit-core/src/writer.rs
// ============================================================================
// Module: Streaming Result Writer
// Description: Incremental JSON emission with container state tracking.
// Purpose: Let method bodies stream large results without buffering them.
// Dependencies: crate::error, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`JsonWriter`] is a small state machine over a stack of open containers.
//! Every operation validates the transition before emitting text, so a
//! sequence that returns `Ok` at every step always yields well-formed JSON
//! once the stack is empty. Emitted text accumulates in a pending buffer that
//! the transport drains with [`JsonWriter::take_pending`]; an optional capture
//! buffer retains everything for response validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::error::ApiError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Writer usage or transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriterError {
    /// A value was written inside a map without a preceding key.
    #[error("value written without key")]
    ValueWithoutKey,
    /// A key was written while the previous key still awaits its value.
    #[error("key written, but no value")]
    DanglingKey,
    /// A key was written outside a map.
    #[error("cannot write key outside a map")]
    KeyOutsideMap,
    /// Close was called with no open container.
    #[error("nothing to close")]
    NothingToClose,
    /// Close would end a container opened by the caller's owner.
    #[error("cannot close a container opened by the caller")]
    OutsideScope,
    /// Value serialization failed.
    #[error("value serialization failed: {0}")]
    Serialize(String),
    /// The transport stopped accepting output.
    #[error("output stream closed")]
    Closed,
    /// The transport did not accept output within the idle window.
    #[error("output stream idle timeout")]
    Timeout,
}

impl From<WriterError> for ApiError {
    fn from(error: WriterError) -> Self {
        Self::internal(error.to_string())
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Container kind on the writer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// JSON object.
    Map,
    /// JSON array.
    List,
}

/// Observable writer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// No container is open.
    Empty,
    /// Inside a map, the next token must be a key (or close).
    AwaitingKey,
    /// Inside a map, a key was written and its value is pending.
    AwaitingValue,
    /// Inside a list.
    InList,
}

/// Open container frame.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Container kind.
    kind: ContainerKind,
    /// Keys (maps) or items (lists) written so far.
    items: usize,
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Incremental JSON writer.
///
/// # Invariants
/// - `dangling_key` is only set while the top frame is a map.
/// - Pending and captured text are always a prefix-consistent view of the
///   same emitted stream.
#[derive(Debug, Default)]
pub struct JsonWriter {
    /// Open containers, innermost last.
    stack: Vec<Frame>,
    /// True after a key until its value starts.
    dangling_key: bool,
    /// Text emitted but not yet drained by the transport.
    pending: String,
    /// Side buffer of all emitted text when capture is enabled.
    capture: Option<String>,
}

impl JsonWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that also records everything into a capture buffer.
    #[must_use]
    pub fn with_capture() -> Self {
        Self {
            capture: Some(String::new()),
            ..Self::default()
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> WriterState {
        match self.stack.last() {
            None => WriterState::Empty,
            Some(frame) if frame.kind == ContainerKind::List => WriterState::InList,
            Some(_) if self.dangling_key => WriterState::AwaitingValue,
            Some(_) => WriterState::AwaitingKey,
        }
    }

    /// Returns the number of open containers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Opens a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::ValueWithoutKey`] inside a map with no pending key.
    pub fn open_map(&mut self) -> Result<&mut Self, WriterError> {
        self.open(ContainerKind::Map, "{")
    }

    /// Opens a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::ValueWithoutKey`] inside a map with no pending key.
    pub fn open_list(&mut self) -> Result<&mut Self, WriterError> {
        self.open(ContainerKind::List, "[")
    }

    /// Closes the innermost container.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NothingToClose`] on an empty stack and
    /// [`WriterError::DanglingKey`] when a key still awaits its value.
    pub fn close(&mut self) -> Result<&mut Self, WriterError> {
        if self.dangling_key {
            return Err(WriterError::DanglingKey);
        }
        let frame = self.stack.pop().ok_or(WriterError::NothingToClose)?;
        match frame.kind {
            ContainerKind::Map => self.emit("}"),
            ContainerKind::List => self.emit("]"),
        }
        Ok(self)
    }

    /// Writes a map key.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::KeyOutsideMap`] outside a map and
    /// [`WriterError::DanglingKey`] while the previous key awaits a value.
    pub fn key(&mut self, name: &str) -> Result<&mut Self, WriterError> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(WriterError::KeyOutsideMap);
        };
        if frame.kind != ContainerKind::Map {
            return Err(WriterError::KeyOutsideMap);
        }
        if self.dangling_key {
            return Err(WriterError::DanglingKey);
        }
        let separator = frame.items > 0;
        frame.items += 1;
        let encoded =
            serde_json::to_string(name).map_err(|err| WriterError::Serialize(err.to_string()))?;
        if separator {
            self.emit(",");
        }
        self.emit(&encoded);
        self.emit(":");
        self.dangling_key = true;
        Ok(self)
    }

    /// Writes a serialized value.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Serialize`] when serialization fails and
    /// [`WriterError::ValueWithoutKey`] inside a map with no pending key.
    pub fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, WriterError> {
        let encoded =
            serde_json::to_string(value).map_err(|err| WriterError::Serialize(err.to_string()))?;
        self.begin_value()?;
        self.emit(&encoded);
        Ok(self)
    }

    /// Writes already-formed JSON text as a value.
    ///
    /// The text is trusted; callers forward JSON produced elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::ValueWithoutKey`] inside a map with no pending key.
    pub fn raw(&mut self, json_text: &str) -> Result<&mut Self, WriterError> {
        self.begin_value()?;
        self.emit(json_text);
        Ok(self)
    }

    /// Closes containers until `depth` remain, writing `null` for a dangling key.
    ///
    /// # Errors
    ///
    /// Propagates writer failures; none occur for a consistent stack.
    pub fn unwind_to(&mut self, depth: usize) -> Result<&mut Self, WriterError> {
        while self.stack.len() > depth {
            if self.dangling_key {
                self.raw("null")?;
            }
            self.close()?;
        }
        Ok(self)
    }

    /// Drains text emitted since the last call.
    pub fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }

    /// Returns the number of bytes waiting to be drained.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns the capture buffer when capture is enabled.
    #[must_use]
    pub fn captured(&self) -> Option<&str> {
        self.capture.as_deref()
    }

    /// Consumes the writer and returns undrained text.
    #[must_use]
    pub fn into_pending(self) -> String {
        self.pending
    }

    /// Validates and records the start of a value.
    fn begin_value(&mut self) -> Result<(), WriterError> {
        let separator = match self.stack.last_mut() {
            None => false,
            Some(frame) => match frame.kind {
                ContainerKind::Map => {
                    if !self.dangling_key {
                        return Err(WriterError::ValueWithoutKey);
                    }
                    self.dangling_key = false;
                    false
                }
                ContainerKind::List => {
                    frame.items += 1;
                    frame.items > 1
                }
            },
        };
        if separator {
            self.emit(",");
        }
        Ok(())
    }

    /// Opens a container after validating the value position.
    fn open(&mut self, kind: ContainerKind, token: &str) -> Result<&mut Self, WriterError> {
        self.begin_value()?;
        self.emit(token);
        self.stack.push(Frame {
            kind,
            items: 0,
        });
        Ok(self)
    }

    /// Appends text to the pending and capture buffers.
    fn emit(&mut self, text: &str) {
        self.pending.push_str(text);
        if let Some(capture) = self.capture.as_mut() {
            capture.push_str(text);
        }
    }
}
