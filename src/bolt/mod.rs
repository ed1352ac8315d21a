//! # Bolt Protocol Implementation
//!
//! Low-level building blocks of the Bolt wire protocol.
//!
//! ## Overview
//!
//! The Bolt protocol is a binary, versioned protocol spoken over TCP between
//! a client and a graph database server. This module provides:
//!
//! - **Handshake** - Protocol version proposal and agreement
//! - **Codec** - Chunked message framing
//! - **Messages** - Request/response envelopes
//! - **Reader/Writer** - Per-version message I/O buffers
//! - **Protocols** - Bolt 1 to 4.0 and version selection
//!
//! ## Submodules
//!
//! - [`handshake`] - Version negotiation
//! - [`codec`] - Chunk codec for tokio_util
//! - [`message`] - Message envelopes and signatures
//! - [`io`] - Message reader, writer and response handlers
//! - [`protocol`] - Protocol implementations and [`BoltProtocolFactory`]
//! - [`error`] - Protocol error types
//!
//! ## Note
//!
//! Nothing here touches a socket. [`crate::driver::SocketClient`] moves the
//! bytes produced and consumed by these types.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod io;
pub mod message;
pub mod protocol;

pub use codec::{ChunkCodec, MAX_CHUNK_SIZE};
pub use error::{BoltError, BoltResult, ErrorKind, HandshakeError};
pub use handshake::{BoltVersion, Handshake, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
pub use io::{BufferSettings, MessageReader, MessageWriter, ResponseHandler, ResponsePipeline};
pub use message::{RawRequest, Request, RequestMessage, ResponseKind, ResponseMessage};
pub use protocol::{
    BoltProtocol, BoltProtocolFactory, BoltProtocolV1, BoltProtocolV2, BoltProtocolV3,
    BoltProtocolV4,
};
