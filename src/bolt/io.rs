//! Versioned message reader and writer.
//!
//! Readers and writers are pure buffer machines: the writer turns requests
//! into chunked bytes waiting to be flushed, the reader turns bytes fed to it
//! into response messages. Moving bytes to and from the socket is left to
//! the connection, which does it either blocking or asynchronously.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use super::codec::{ChunkCodec, DEFAULT_MAX_MESSAGE_SIZE, MAX_CHUNK_SIZE};
use super::handshake::format_version;
use super::message::{RequestMessage, ResponseKind, ResponseMessage, MAX_TINY_STRUCT_FIELDS};
use super::{BoltError, BoltResult};

/// Buffer sizing for readers and writers.
///
/// Buffers grow as needed while a message is processed and are shrunk back
/// to the default size once they exceed the maximum and are drained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Initial read buffer capacity
    pub default_read_buffer_size: usize,
    /// Capacity above which a drained read buffer is shrunk
    pub max_read_buffer_size: usize,
    /// Initial write buffer capacity
    pub default_write_buffer_size: usize,
    /// Capacity above which a flushed write buffer is shrunk
    pub max_write_buffer_size: usize,
    /// Largest reassembled message accepted from the server
    pub max_message_size: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            default_read_buffer_size: 32 * 1024,
            max_read_buffer_size: 128 * 1024,
            default_write_buffer_size: 16 * 1024,
            max_write_buffer_size: 64 * 1024,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

// ============================================================================
// MessageReader
// ============================================================================

/// Reads response messages for one protocol version.
#[derive(Debug)]
pub struct MessageReader {
    version: u32,
    codec: ChunkCodec,
    /// Bytes received but not yet decoded
    buffer: BytesMut,
    /// Landing area for socket reads
    scratch: Vec<u8>,
    settings: BufferSettings,
}

impl MessageReader {
    /// Create a reader for `version`.
    pub fn new(version: u32, settings: &BufferSettings) -> Self {
        Self {
            version,
            codec: ChunkCodec::with_limits(MAX_CHUNK_SIZE, settings.max_message_size),
            buffer: BytesMut::with_capacity(settings.default_read_buffer_size),
            scratch: vec![0u8; settings.default_read_buffer_size.max(1)],
            settings: settings.clone(),
        }
    }

    /// Protocol version this reader was built for.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Decode the next complete message from buffered bytes, if any.
    pub fn try_read(&mut self) -> BoltResult<Option<ResponseMessage>> {
        match self.codec.decode(&mut self.buffer)? {
            Some(body) => {
                self.shrink();
                ResponseMessage::parse(body).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Space the caller reads socket bytes into before calling [`commit`].
    ///
    /// [`commit`]: MessageReader::commit
    pub fn read_space(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    /// Make the first `n` bytes of the read space available for decoding.
    pub fn commit(&mut self, n: usize) {
        self.buffer.extend_from_slice(&self.scratch[..n]);
    }

    /// Whether undecoded bytes are buffered.
    pub fn has_buffered(&self) -> bool {
        !self.buffer.is_empty() || self.codec.in_message()
    }

    /// Take over unread bytes from a reader this one replaces.
    pub fn take_over(&mut self, previous: MessageReader) {
        self.buffer = previous.buffer;
        self.codec = previous.codec;
    }

    fn shrink(&mut self) {
        if self.buffer.is_empty() && self.buffer.capacity() > self.settings.max_read_buffer_size {
            self.buffer = BytesMut::with_capacity(self.settings.default_read_buffer_size);
        }
    }
}

// ============================================================================
// MessageWriter
// ============================================================================

/// Writes request messages for one protocol version.
#[derive(Debug)]
pub struct MessageWriter {
    version: u32,
    /// Request signatures this version defines
    requests: &'static [u8],
    codec: ChunkCodec,
    /// Scratch space for one unchunked message
    body: BytesMut,
    /// Chunked bytes waiting for a flush
    buffer: BytesMut,
    settings: BufferSettings,
}

impl MessageWriter {
    /// Create a writer for `version` accepting the given request signatures.
    pub fn new(version: u32, requests: &'static [u8], settings: &BufferSettings) -> Self {
        Self {
            version,
            requests,
            codec: ChunkCodec::with_limits(MAX_CHUNK_SIZE, settings.max_message_size),
            body: BytesMut::with_capacity(256),
            buffer: BytesMut::with_capacity(settings.default_write_buffer_size),
            settings: settings.clone(),
        }
    }

    /// Protocol version this writer was built for.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Encode one message into the pending buffer.
    pub fn write(&mut self, message: &dyn RequestMessage) -> BoltResult<()> {
        let signature = message.signature();
        if !self.requests.contains(&signature) {
            return Err(BoltError::UnsupportedMessage {
                signature,
                version: format_version(self.version),
            });
        }
        if message.field_count() > MAX_TINY_STRUCT_FIELDS {
            return Err(BoltError::TooManyFields {
                signature,
                field_count: message.field_count(),
            });
        }

        self.body.clear();
        message.encode(&mut self.body);
        self.codec.encode(&self.body[..], &mut self.buffer)
    }

    /// Bytes written since the last flush.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether bytes are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drop pending bytes after they reached the socket.
    pub fn flushed(&mut self) {
        self.buffer.clear();
        if self.buffer.capacity() > self.settings.max_write_buffer_size {
            self.buffer = BytesMut::with_capacity(self.settings.default_write_buffer_size);
        }
    }
}

// ============================================================================
// ResponseHandler
// ============================================================================

/// Consumes responses on behalf of whoever sent the requests.
pub trait ResponseHandler: Send {
    /// Responses still expected. Receiving stops when this reaches zero.
    fn unhandled_message_count(&self) -> usize;

    /// Handle one response.
    fn on_message(&mut self, message: ResponseMessage);

    /// A protocol violation detected while handling, if any.
    fn take_protocol_violation(&mut self) -> Option<String>;
}

/// Handler that expects one summary per request sent.
///
/// RECORDs are detail messages and do not complete a request. Anything the
/// server sends while no request is pending, or with an unknown signature,
/// is a protocol violation.
#[derive(Debug, Default)]
pub struct ResponsePipeline {
    pending: usize,
    messages: Vec<ResponseMessage>,
    violation: Option<String>,
}

impl ResponsePipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `summaries` more summary messages.
    pub fn expect(&mut self, summaries: usize) {
        self.pending += summaries;
    }

    /// Messages received so far.
    pub fn messages(&self) -> &[ResponseMessage] {
        &self.messages
    }

    /// Take the received messages.
    pub fn take_messages(&mut self) -> Vec<ResponseMessage> {
        std::mem::take(&mut self.messages)
    }
}

impl ResponseHandler for ResponsePipeline {
    fn unhandled_message_count(&self) -> usize {
        self.pending
    }

    fn on_message(&mut self, message: ResponseMessage) {
        let kind = message.kind();
        match kind {
            ResponseKind::Unknown(signature) => {
                self.violation = Some(format!("Unknown response message 0x{:02X}", signature));
                return;
            }
            _ if self.pending == 0 => {
                self.violation = Some(format!("{} received while no request was pending", message));
                return;
            }
            _ if kind.is_summary() => self.pending -= 1,
            _ => {}
        }
        self.messages.push(message);
    }

    fn take_protocol_violation(&mut self) -> Option<String> {
        self.violation.take()
    }
}
