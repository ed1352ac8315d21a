//! Client-side Bolt handshake negotiation.

use super::{HandshakeError, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};

/// Version slots in a handshake proposal.
pub const PROPOSAL_SLOTS: usize = 4;

/// Agreed version meaning "no version in common".
pub const NO_PROTOCOL_VERSION: u32 = 0;

/// "HTTP" read as a big-endian integer. Sent back by HTTP endpoints.
pub const HTTP_RESPONSE: u32 = 0x4854_5450;

/// Bolt handshake handler.
///
/// The handshake process:
/// 1. Client sends 20 bytes: 4-byte magic + 4 x 4-byte version proposals
/// 2. Server finds the first proposal it supports
/// 3. Server responds with 4-byte agreed version (or 0x00000000 if none)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Proposals, most preferred first, zero padded
    proposed: [u32; PROPOSAL_SLOTS],
}

impl Handshake {
    /// Create a handshake proposing `versions` in order.
    ///
    /// Only the first four versions fit in the proposal.
    pub fn new(versions: &[u32]) -> Self {
        let mut proposed = [NO_PROTOCOL_VERSION; PROPOSAL_SLOTS];
        for (slot, version) in proposed.iter_mut().zip(versions) {
            *slot = *version;
        }
        Self { proposed }
    }

    /// The proposal slots as sent on the wire.
    pub fn proposed(&self) -> [u32; PROPOSAL_SLOTS] {
        self.proposed
    }

    /// Build the 20-byte client handshake.
    pub fn request(&self) -> [u8; HANDSHAKE_SIZE] {
        let mut data = [0u8; HANDSHAKE_SIZE];
        data[0..4].copy_from_slice(&BOLT_MAGIC);

        for (i, version) in self.proposed.iter().enumerate() {
            let offset = 4 + i * 4;
            data[offset..offset + 4].copy_from_slice(&version.to_be_bytes());
        }

        data
    }

    /// Parse the server's 4-byte answer.
    pub fn parse_response(response: [u8; HANDSHAKE_RESPONSE_SIZE]) -> u32 {
        u32::from_be_bytes(response)
    }

    /// Validate the agreed version.
    ///
    /// Rejects the "no agreement" sentinel and HTTP answers. Whether the
    /// version has an implementation is decided by the protocol factory.
    pub fn accept(&self, agreed: u32) -> Result<u32, HandshakeError> {
        match agreed {
            NO_PROTOCOL_VERSION => Err(HandshakeError::NoCompatibleVersion {
                proposed: self.proposed,
            }),
            HTTP_RESPONSE => Err(HandshakeError::HttpEndpoint),
            version => Ok(version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let handshake = Handshake::new(&[4, 3, 2, 1]);
        let data = handshake.request();

        assert_eq!(&data[0..4], &BOLT_MAGIC);
        assert_eq!(&data[4..8], &[0x00, 0x00, 0x00, 0x04]);
        assert_eq!(&data[8..12], &[0x00, 0x00, 0x00, 0x03]);
        assert_eq!(&data[12..16], &[0x00, 0x00, 0x00, 0x02]);
        assert_eq!(&data[16..20], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_short_proposal_is_zero_padded() {
        let handshake = Handshake::new(&[3]);
        assert_eq!(handshake.proposed(), [3, 0, 0, 0]);

        let data = handshake.request();
        assert_eq!(&data[8..20], &[0u8; 12]);
    }

    #[test]
    fn test_long_proposal_is_truncated() {
        let handshake = Handshake::new(&[6, 5, 4, 3, 2, 1]);
        assert_eq!(handshake.proposed(), [6, 5, 4, 3]);
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(Handshake::parse_response([0x00, 0x00, 0x00, 0x02]), 2);
        assert_eq!(Handshake::parse_response([0x00, 0x00, 0x01, 0x04]), 0x0104);
        assert_eq!(Handshake::parse_response(*b"HTTP"), HTTP_RESPONSE);
    }

    #[test]
    fn test_accept_agreed_version() {
        let handshake = Handshake::new(&[4, 3, 2, 1]);
        assert_eq!(handshake.accept(2), Ok(2));
    }

    #[test]
    fn test_no_compatible_version() {
        let handshake = Handshake::new(&[4, 3]);
        let err = handshake.accept(NO_PROTOCOL_VERSION).unwrap_err();
        assert_eq!(err, HandshakeError::NoCompatibleVersion { proposed: [4, 3, 0, 0] });
    }

    #[test]
    fn test_http_endpoint() {
        let handshake = Handshake::new(&[4]);
        assert_eq!(handshake.accept(HTTP_RESPONSE), Err(HandshakeError::HttpEndpoint));
    }
}
