//! Protocol implementations and version selection.

use std::fmt;
use std::sync::Arc;

use super::handshake::{format_version, BoltVersion, Handshake, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
use super::io::{BufferSettings, MessageReader, MessageWriter};
use super::message::signature::*;
use super::{BoltError, BoltResult};

/// A Bolt protocol version: factory for its reader and writer.
pub trait BoltProtocol: fmt::Debug + Send + Sync {
    /// Raw handshake encoding of this version.
    fn version(&self) -> u32;

    /// Request signatures defined by this version.
    fn request_signatures(&self) -> &'static [u8];

    /// Whether the client may say GOODBYE before disconnecting.
    fn supports_goodbye(&self) -> bool {
        self.request_signatures().contains(&GOODBYE)
    }

    /// Create a reader bound to `settings`.
    fn new_reader(&self, settings: &BufferSettings) -> MessageReader {
        MessageReader::new(self.version(), settings)
    }

    /// Create a writer bound to `settings`.
    fn new_writer(&self, settings: &BufferSettings) -> MessageWriter {
        MessageWriter::new(self.version(), self.request_signatures(), settings)
    }
}

const V1_REQUESTS: &[u8] = &[HELLO, ACK_FAILURE, RESET, RUN, DISCARD, PULL];
const V3_REQUESTS: &[u8] = &[HELLO, GOODBYE, RESET, RUN, BEGIN, COMMIT, ROLLBACK, DISCARD, PULL];

/// Bolt 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoltProtocolV1;

impl BoltProtocol for BoltProtocolV1 {
    fn version(&self) -> u32 {
        BoltVersion::V1.as_u32()
    }

    fn request_signatures(&self) -> &'static [u8] {
        V1_REQUESTS
    }
}

/// Bolt 2. Same envelope as Bolt 1; adds value types only.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoltProtocolV2;

impl BoltProtocol for BoltProtocolV2 {
    fn version(&self) -> u32 {
        BoltVersion::V2.as_u32()
    }

    fn request_signatures(&self) -> &'static [u8] {
        V1_REQUESTS
    }
}

/// Bolt 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoltProtocolV3;

impl BoltProtocol for BoltProtocolV3 {
    fn version(&self) -> u32 {
        BoltVersion::V3.as_u32()
    }

    fn request_signatures(&self) -> &'static [u8] {
        V3_REQUESTS
    }
}

/// Bolt 4.0. PULL and DISCARD take a size, the envelope is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoltProtocolV4;

impl BoltProtocol for BoltProtocolV4 {
    fn version(&self) -> u32 {
        BoltVersion::V4_0.as_u32()
    }

    fn request_signatures(&self) -> &'static [u8] {
        V3_REQUESTS
    }
}

/// Selects the protocol implementation for a negotiated version.
///
/// The registration order is the handshake preference order. A factory is
/// immutable once built, so one instance is shared by every connection.
#[derive(Debug, Clone)]
pub struct BoltProtocolFactory {
    protocols: Vec<Arc<dyn BoltProtocol>>,
}

impl BoltProtocolFactory {
    /// Create a factory proposing `protocols` in the given order.
    pub fn new(protocols: Vec<Arc<dyn BoltProtocol>>) -> Self {
        Self { protocols }
    }

    /// Versions in preference order.
    pub fn supported_versions(&self) -> Vec<u32> {
        self.protocols.iter().map(|p| p.version()).collect()
    }

    /// Handshake for the supported versions.
    pub fn handshake(&self) -> Handshake {
        Handshake::new(&self.supported_versions())
    }

    /// The 20-byte handshake proposal.
    pub fn pack_supported_versions(&self) -> [u8; HANDSHAKE_SIZE] {
        self.handshake().request()
    }

    /// Parse the server's 4-byte answer.
    pub fn unpack_agreed_version(response: [u8; HANDSHAKE_RESPONSE_SIZE]) -> u32 {
        Handshake::parse_response(response)
    }

    /// The implementation registered for `version`.
    pub fn for_version(&self, version: u32) -> BoltResult<Arc<dyn BoltProtocol>> {
        self.protocols
            .iter()
            .find(|p| p.version() == version)
            .cloned()
            .ok_or(BoltError::UnsupportedVersion(version))
    }

    /// Whether `version` has an implementation.
    pub fn supports(&self, version: u32) -> bool {
        self.protocols.iter().any(|p| p.version() == version)
    }
}

impl Default for BoltProtocolFactory {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(BoltProtocolV4),
            Arc::new(BoltProtocolV3),
            Arc::new(BoltProtocolV2),
            Arc::new(BoltProtocolV1),
        ])
    }
}

impl fmt::Display for BoltProtocolFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let versions: Vec<String> = self.protocols.iter().map(|p| format_version(p.version())).collect();
        write!(f, "[{}]", versions.join(", "))
    }
}
