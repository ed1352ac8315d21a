//! Bolt protocol error types.

use std::io;

use thiserror::Error;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Bolt protocol errors.
#[derive(Debug, Error)]
pub enum BoltError {
    /// I/O error on an established transport
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport could not be opened
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed {
        /// Address that was dialled
        address: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Handshake error
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// The agreed version has no local implementation
    #[error("Unsupported protocol version: 0x{0:08X}")]
    UnsupportedVersion(u32),

    /// The server sent a structurally invalid or out-of-sequence message
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Message too large
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size of the offending message
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Request not part of the bound protocol version
    #[error("Message 0x{signature:02X} is not supported by Bolt {version}")]
    UnsupportedMessage {
        /// Request signature
        signature: u8,
        /// Bound protocol version
        version: String,
    },

    /// Request with more fields than a tiny structure can carry
    #[error("Message 0x{signature:02X} has {field_count} fields (max: 15)")]
    TooManyFields {
        /// Request signature
        signature: u8,
        /// Declared field count
        field_count: u8,
    },

    /// State machine error (invalid state transition)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Asynchronous operation cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse classification of [`BoltError`].
///
/// Callers use this to tell a network problem from a misbehaving server
/// without matching on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect/read/write failure or a closed connection
    Transport,
    /// Client and server share no protocol version
    HandshakeMismatch,
    /// Agreed version has no implementation on this side
    UnsupportedVersion,
    /// Server sent something the protocol does not allow
    ProtocolViolation,
    /// Asynchronous operation was cancelled
    Cancelled,
    /// API misuse, e.g. sending before the handshake
    Usage,
}

impl BoltError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoltError::Io(_) | BoltError::ConnectFailed { .. } | BoltError::ConnectionClosed => {
                ErrorKind::Transport
            }
            BoltError::Handshake(_) => ErrorKind::HandshakeMismatch,
            BoltError::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            BoltError::ProtocolViolation(_) | BoltError::MessageTooLarge { .. } => {
                ErrorKind::ProtocolViolation
            }
            BoltError::Cancelled => ErrorKind::Cancelled,
            BoltError::UnsupportedMessage { .. }
            | BoltError::TooManyFields { .. }
            | BoltError::InvalidState(_) => ErrorKind::Usage,
        }
    }

    /// Whether the pool may retry the operation on a fresh connection.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Shorthand for a protocol violation.
    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        BoltError::ProtocolViolation(msg.into())
    }
}

/// Handshake-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Server answered with the "no agreement" sentinel
    #[error("The server does not support any of the protocol versions supported by this driver (proposed {proposed:08X?})")]
    NoCompatibleVersion {
        /// Versions the client proposed
        proposed: [u32; 4],
    },

    /// Server answered with an HTTP response
    #[error("Server responded HTTP. Make sure you are not trying to connect to the http endpoint (HTTP defaults to port 7474 whereas Bolt defaults to port 7687)")]
    HttpEndpoint,
}
