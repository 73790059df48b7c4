// crates/basekit-server/src/stream.rs
// ============================================================================
// Module: Result Stream
// Description: Binds the streaming JSON writer to an async chunk sink.
// Purpose: Stream method results to the client without buffering them whole.
// Dependencies: basekit-core, bytes, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! [`ResultStream`] wraps a [`JsonWriter`] and drains its pending text into a
//! [`ChunkSink`] on [`ResultStream::flush`]. The HTTP transport uses
//! [`ChannelSink`], which forwards chunks into the response body with an idle
//! timeout per chunk; tests use [`BufferSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use basekit_core::ApiError;
use basekit_core::DocumentStream;
use basekit_core::JsonWriter;
use basekit_core::WriterError;
use basekit_core::WriterState;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Pending byte count that triggers a flush while streaming sequences.
pub const FLUSH_THRESHOLD: usize = 16 * 1024;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for response chunks.
#[async_trait]
pub trait ChunkSink: Send {
    /// Sends one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Closed`] when the receiver is gone and
    /// [`WriterError::Timeout`] when it did not accept the chunk in time.
    async fn send(&mut self, chunk: Bytes) -> Result<(), WriterError>;
}

/// Sink forwarding chunks into a bounded channel feeding the response body.
pub struct ChannelSink {
    /// Response body channel.
    sender: mpsc::Sender<Result<Bytes, io::Error>>,
    /// Maximum wait for the receiver to accept one chunk.
    idle_timeout: Duration,
}

impl ChannelSink {
    /// Creates a channel sink.
    #[must_use]
    pub const fn new(sender: mpsc::Sender<Result<Bytes, io::Error>>, idle_timeout: Duration) -> Self {
        Self {
            sender,
            idle_timeout,
        }
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), WriterError> {
        match tokio::time::timeout(self.idle_timeout, self.sender.send(Ok(chunk))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(WriterError::Closed),
            Err(_) => Err(WriterError::Timeout),
        }
    }
}

/// Sink collecting every chunk in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    /// Collected bytes.
    bytes: Vec<u8>,
    /// Number of chunks received.
    chunks: usize,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the number of chunks received.
    #[must_use]
    pub const fn chunks(&self) -> usize {
        self.chunks
    }

    /// Returns the collected text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[async_trait]
impl ChunkSink for BufferSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), WriterError> {
        self.bytes.extend_from_slice(&chunk);
        self.chunks += 1;
        Ok(())
    }
}

// ============================================================================
// SECTION: Result Stream
// ============================================================================

/// Streaming writer bound to a chunk sink.
pub struct ResultStream<'a> {
    /// Writer state machine.
    writer: JsonWriter,
    /// Chunk destination.
    sink: &'a mut dyn ChunkSink,
    /// Depth at or below which [`ResultStream::close`] is refused.
    floor: usize,
}

impl<'a> ResultStream<'a> {
    /// Creates a stream; `capture` keeps a copy of all output for validation.
    pub fn new(sink: &'a mut dyn ChunkSink, capture: bool) -> Self {
        let writer = if capture { JsonWriter::with_capture() } else { JsonWriter::new() };
        Self {
            writer,
            sink,
            floor: 0,
        }
    }

    /// Returns the writer state.
    #[must_use]
    pub fn state(&self) -> WriterState {
        self.writer.state()
    }

    /// Returns the number of open containers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.writer.depth()
    }

    /// Opens a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError`] when the transition is invalid.
    pub fn open_map(&mut self) -> Result<&mut Self, WriterError> {
        self.writer.open_map()?;
        Ok(self)
    }

    /// Opens a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError`] when the transition is invalid.
    pub fn open_list(&mut self) -> Result<&mut Self, WriterError> {
        self.writer.open_list()?;
        Ok(self)
    }

    /// Closes the innermost container.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::OutsideScope`] when the innermost container was
    /// opened before the caller received the stream, and [`WriterError`] when
    /// the transition is invalid.
    pub fn close(&mut self) -> Result<&mut Self, WriterError> {
        if self.floor > 0 && self.writer.depth() <= self.floor {
            return Err(WriterError::OutsideScope);
        }
        self.writer.close()?;
        Ok(self)
    }

    /// Writes a map key.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError`] when the transition is invalid.
    pub fn key(&mut self, name: &str) -> Result<&mut Self, WriterError> {
        self.writer.key(name)?;
        Ok(self)
    }

    /// Writes a serialized value.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError`] when serialization or the transition fails.
    pub fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, WriterError> {
        self.writer.value(value)?;
        Ok(self)
    }

    /// Writes already-formed JSON text as a value.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError`] when the transition is invalid.
    pub fn raw(&mut self, json_text: &str) -> Result<&mut Self, WriterError> {
        self.writer.raw(json_text)?;
        Ok(self)
    }

    /// Sends pending output to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Closed`] or [`WriterError::Timeout`] from the sink.
    pub async fn flush(&mut self) -> Result<(), WriterError> {
        if self.writer.pending_len() == 0 {
            return Ok(());
        }
        let chunk = Bytes::from(self.writer.take_pending());
        self.sink.send(chunk).await
    }

    /// Writes every document of `documents` as a JSON array, flushing as the
    /// pending buffer fills.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the store, the writer, or the sink fails.
    pub async fn write_documents(&mut self, mut documents: DocumentStream) -> Result<(), ApiError> {
        self.open_list()?;
        while let Some(document) = documents.next().await {
            self.value(&document?)?;
            if self.writer.pending_len() >= FLUSH_THRESHOLD {
                self.flush().await?;
            }
        }
        self.close()?;
        Ok(())
    }

    /// Protects the innermost `depth` containers from [`ResultStream::close`].
    pub(crate) const fn set_floor(&mut self, depth: usize) {
        self.floor = depth;
    }

    /// Closes containers until `depth` remain.
    pub(crate) fn unwind_to(&mut self, depth: usize) -> Result<(), WriterError> {
        self.writer.unwind_to(depth)?;
        Ok(())
    }

    /// Returns the capture buffer length, or zero when capture is off.
    pub(crate) fn captured_len(&self) -> usize {
        self.writer.captured().map_or(0, str::len)
    }

    /// Returns captured text from `offset` onward.
    pub(crate) fn captured_from(&self, offset: usize) -> Option<&str> {
        self.writer.captured().and_then(|text| text.get(offset..))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
