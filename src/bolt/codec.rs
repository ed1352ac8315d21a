//! Bolt chunked message framing for tokio_util.
//!
//! Messages are split into chunks with a 2-byte big-endian length prefix
//! and terminated by an empty chunk (`00 00`).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::BoltError;

/// Maximum chunk payload (largest u16)
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Default maximum size of a single reassembled message (16MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Bolt chunk codec.
///
/// Decodes a chunk stream into complete message bodies and encodes message
/// bodies into chunks. It knows nothing about message contents.
#[derive(Debug)]
pub struct ChunkCodec {
    /// Maximum message size
    max_message_size: usize,
    /// Largest chunk the encoder emits
    chunk_size: usize,
    /// Buffer for accumulating chunks
    message_buffer: BytesMut,
}

impl ChunkCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_limits(MAX_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a codec with a custom chunk size and max message size.
    pub fn with_limits(chunk_size: usize, max_message_size: usize) -> Self {
        Self {
            max_message_size,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
            message_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Whether a message is partially assembled.
    pub fn in_message(&self) -> bool {
        !self.message_buffer.is_empty()
    }

    /// Encode a message into chunks.
    fn encode_chunked(&self, data: &[u8], dst: &mut BytesMut) {
        dst.reserve(data.len() + (data.len() / self.chunk_size + 1) * 2 + END_MARKER.len());

        for chunk in data.chunks(self.chunk_size) {
            // Write chunk header (2-byte big-endian length)
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }

        dst.put_slice(&END_MARKER);
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Need at least 2 bytes for chunk header
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_size == 0 {
                src.advance(2);

                if self.message_buffer.is_empty() {
                    // NOOP chunk (keep-alive), skip
                    continue;
                }

                return Ok(Some(self.message_buffer.split().freeze()));
            }

            if src.len() < 2 + chunk_size {
                return Ok(None);
            }

            if self.message_buffer.len() + chunk_size > self.max_message_size {
                return Err(BoltError::MessageTooLarge {
                    size: self.message_buffer.len() + chunk_size,
                    max: self.max_message_size,
                });
            }

            src.advance(2);
            self.message_buffer.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
        }
    }
}

impl Encoder<&[u8]> for ChunkCodec {
    type Error = BoltError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_message_size {
            return Err(BoltError::MessageTooLarge {
                size: item.len(),
                max: self.max_message_size,
            });
        }
        self.encode_chunked(item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_message() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(&b"\xB0\x0F"[..], &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x02, 0xB0, 0x0F, 0x00, 0x00]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], b"\xB0\x0F");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_chunked_large_message() {
        let mut codec = ChunkCodec::with_limits(16, DEFAULT_MAX_MESSAGE_SIZE);
        let mut buf = BytesMut::new();

        let data = vec![0x42u8; 40];
        codec.encode(&data[..], &mut buf).unwrap();

        // 16 + 16 + 8 byte chunks, each with a header, then the end marker
        assert_eq!(buf.len(), 40 + 3 * 2 + 2);
        assert_eq!(&buf[0..2], &[0x00, 0x10]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &data[..]);
    }

    #[test]
    fn test_partial_chunk() {
        let mut codec = ChunkCodec::new();
        let mut full = BytesMut::new();
        codec.encode(&b"\xB1\x70\xA0"[..], &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..3]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[3..]);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(&decoded[..], b"\xB1\x70\xA0");
    }

    #[test]
    fn test_message_split_across_reads() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();

        // First chunk arrives, end marker still missing
        buf.put_u16(2);
        buf.put_slice(&[0xB0, 0x7E]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.in_message());

        buf.put_slice(&END_MARKER);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &[0xB0, 0x7E]);
        assert!(!codec.in_message());
    }

    #[test]
    fn test_message_too_large() {
        let mut codec = ChunkCodec::with_limits(MAX_CHUNK_SIZE, 100);
        let mut buf = BytesMut::new();

        buf.put_u16(200);
        buf.extend_from_slice(&[0u8; 200]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(BoltError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_noop_chunk_skipped() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();

        buf.put_slice(&END_MARKER);
        buf.put_u16(2);
        buf.put_slice(&[0xB0, 0x7E]);
        buf.put_slice(&END_MARKER);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &[0xB0, 0x7E]);
    }

    #[test]
    fn test_multiple_messages() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(&[1u8][..], &mut buf).unwrap();
        codec.encode(&[2u8][..], &mut buf).unwrap();

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[1]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
