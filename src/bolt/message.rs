//! Bolt message envelopes.
//!
//! Every Bolt message is a PackStream structure: a tiny-struct marker
//! carrying the field count, a signature byte, then the fields. This layer
//! only deals with the envelope; field contents are opaque bytes encoded by
//! higher layers.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::{BoltError, BoltResult};

/// Tiny struct marker (0xB0 | field count)
pub const TINY_STRUCT: u8 = 0xB0;

/// Largest field count a tiny struct can carry
pub const MAX_TINY_STRUCT_FIELDS: u8 = 0x0F;

/// Message signatures.
pub mod signature {
    /// INIT (v1, v2) / HELLO (v3+)
    pub const HELLO: u8 = 0x01;
    /// GOODBYE (v3+)
    pub const GOODBYE: u8 = 0x02;
    /// ACK_FAILURE (v1, v2)
    pub const ACK_FAILURE: u8 = 0x0E;
    /// RESET
    pub const RESET: u8 = 0x0F;
    /// RUN
    pub const RUN: u8 = 0x10;
    /// BEGIN (v3+)
    pub const BEGIN: u8 = 0x11;
    /// COMMIT (v3+)
    pub const COMMIT: u8 = 0x12;
    /// ROLLBACK (v3+)
    pub const ROLLBACK: u8 = 0x13;
    /// DISCARD_ALL / DISCARD
    pub const DISCARD: u8 = 0x2F;
    /// PULL_ALL / PULL
    pub const PULL: u8 = 0x3F;

    /// SUCCESS
    pub const SUCCESS: u8 = 0x70;
    /// RECORD
    pub const RECORD: u8 = 0x71;
    /// IGNORED
    pub const IGNORED: u8 = 0x7E;
    /// FAILURE
    pub const FAILURE: u8 = 0x7F;
}

/// A message the client sends.
///
/// `Display` is used for the `C: ...` debug log line.
pub trait RequestMessage: fmt::Display + Send + Sync {
    /// Structure signature byte.
    fn signature(&self) -> u8;

    /// Number of structure fields.
    fn field_count(&self) -> u8 {
        0
    }

    /// Append the encoded fields.
    fn encode_fields(&self, _dst: &mut BytesMut) {}

    /// Append the complete structure (marker, signature, fields).
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(TINY_STRUCT | (self.field_count() & MAX_TINY_STRUCT_FIELDS));
        dst.put_u8(self.signature());
        self.encode_fields(dst);
    }
}

/// Requests that carry no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// RESET
    Reset,
    /// GOODBYE
    Goodbye,
    /// PULL_ALL
    PullAll,
    /// DISCARD_ALL
    DiscardAll,
}

impl RequestMessage for Request {
    fn signature(&self) -> u8 {
        match self {
            Request::Reset => signature::RESET,
            Request::Goodbye => signature::GOODBYE,
            Request::PullAll => signature::PULL,
            Request::DiscardAll => signature::DISCARD,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Request::Reset => "RESET",
            Request::Goodbye => "GOODBYE",
            Request::PullAll => "PULL_ALL",
            Request::DiscardAll => "DISCARD_ALL",
        };
        f.write_str(name)
    }
}

/// A request whose fields were encoded elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    name: &'static str,
    signature: u8,
    field_count: u8,
    fields: Bytes,
}

impl RawRequest {
    /// Create a request from pre-encoded PackStream fields.
    pub fn new(name: &'static str, signature: u8, field_count: u8, fields: impl Into<Bytes>) -> Self {
        Self {
            name,
            signature,
            field_count,
            fields: fields.into(),
        }
    }
}

impl RequestMessage for RawRequest {
    fn signature(&self) -> u8 {
        self.signature
    }

    fn field_count(&self) -> u8 {
        self.field_count
    }

    fn encode_fields(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.fields);
    }
}

impl fmt::Display for RawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.fields.len())
    }
}

/// Kind of a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// SUCCESS summary
    Success,
    /// RECORD detail
    Record,
    /// IGNORED summary
    Ignored,
    /// FAILURE summary
    Failure,
    /// Signature not defined by any Bolt version
    Unknown(u8),
}

impl ResponseKind {
    /// Summaries complete a request, details (RECORD) do not.
    pub fn is_summary(self) -> bool {
        matches!(self, ResponseKind::Success | ResponseKind::Ignored | ResponseKind::Failure)
    }
}

/// A message received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    signature: u8,
    field_count: u8,
    fields: Bytes,
}

impl ResponseMessage {
    /// Parse the structure envelope of a reassembled message body.
    pub fn parse(mut body: Bytes) -> BoltResult<Self> {
        if body.len() < 2 {
            return Err(BoltError::protocol_violation(format!(
                "Message of {} bytes is too short for a structure header",
                body.len()
            )));
        }

        let marker = body[0];
        if marker & 0xF0 != TINY_STRUCT {
            return Err(BoltError::protocol_violation(format!(
                "Expected a structure marker, got 0x{:02X}",
                marker
            )));
        }

        let signature = body[1];
        let fields = body.split_off(2);
        Ok(Self {
            signature,
            field_count: marker & MAX_TINY_STRUCT_FIELDS,
            fields,
        })
    }

    /// Build a response (mainly for fakes and tests).
    pub fn new(signature: u8, field_count: u8, fields: impl Into<Bytes>) -> Self {
        Self {
            signature,
            field_count,
            fields: fields.into(),
        }
    }

    /// Structure signature byte.
    pub fn signature(&self) -> u8 {
        self.signature
    }

    /// Number of structure fields.
    pub fn field_count(&self) -> u8 {
        self.field_count
    }

    /// Encoded fields.
    pub fn fields(&self) -> &Bytes {
        &self.fields
    }

    /// Classify by signature.
    pub fn kind(&self) -> ResponseKind {
        match self.signature {
            signature::SUCCESS => ResponseKind::Success,
            signature::RECORD => ResponseKind::Record,
            signature::IGNORED => ResponseKind::Ignored,
            signature::FAILURE => ResponseKind::Failure,
            other => ResponseKind::Unknown(other),
        }
    }

    /// Encode the envelope back into a message body.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(TINY_STRUCT | (self.field_count & MAX_TINY_STRUCT_FIELDS));
        dst.put_u8(self.signature);
        dst.put_slice(&self.fields);
    }
}

impl fmt::Display for ResponseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ResponseKind::Success => f.write_str("SUCCESS"),
            ResponseKind::Record => f.write_str("RECORD"),
            ResponseKind::Ignored => f.write_str("IGNORED"),
            ResponseKind::Failure => f.write_str("FAILURE"),
            ResponseKind::Unknown(sig) => write!(f, "UNKNOWN(0x{:02X})", sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encoding() {
        let mut buf = BytesMut::new();
        Request::Reset.encode(&mut buf);
        assert_eq!(&buf[..], &[0xB0, 0x0F]);

        buf.clear();
        Request::PullAll.encode(&mut buf);
        assert_eq!(&buf[..], &[0xB0, 0x3F]);
    }

    #[test]
    fn test_raw_request_encoding() {
        let run = RawRequest::new("RUN", signature::RUN, 2, vec![0x80, 0xA0]);
        let mut buf = BytesMut::new();
        run.encode(&mut buf);

        assert_eq!(&buf[..], &[0xB2, 0x10, 0x80, 0xA0]);
        assert_eq!(run.to_string(), "RUN (2 bytes)");
    }

    #[test]
    fn test_parse_success() {
        let message = ResponseMessage::parse(Bytes::from_static(&[0xB1, 0x70, 0xA0])).unwrap();
        assert_eq!(message.kind(), ResponseKind::Success);
        assert_eq!(message.field_count(), 1);
        assert_eq!(&message.fields()[..], &[0xA0]);
        assert_eq!(message.to_string(), "SUCCESS");
    }

    #[test]
    fn test_parse_unknown_signature() {
        let message = ResponseMessage::parse(Bytes::from_static(&[0xB0, 0x42])).unwrap();
        assert_eq!(message.kind(), ResponseKind::Unknown(0x42));
        assert!(!message.kind().is_summary());
    }

    #[test]
    fn test_parse_rejects_non_structure() {
        let err = ResponseMessage::parse(Bytes::from_static(&[0x85, 0x70])).unwrap_err();
        assert!(matches!(err, BoltError::ProtocolViolation(_)));

        let err = ResponseMessage::parse(Bytes::from_static(&[0xB0])).unwrap_err();
        assert!(matches!(err, BoltError::ProtocolViolation(_)));
    }

    #[test]
    fn test_summary_kinds() {
        assert!(ResponseKind::Success.is_summary());
        assert!(ResponseKind::Failure.is_summary());
        assert!(ResponseKind::Ignored.is_summary());
        assert!(!ResponseKind::Record.is_summary());
    }
}
