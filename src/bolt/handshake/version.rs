//! Bolt protocol version definitions.

/// Bolt protocol versions known to this crate.
///
/// Versions travel as 4-byte big-endian integers laid out as
/// `[reserved, range, minor, major]`:
/// - Major version in the lowest byte
/// - Minor version in the byte above it
///
/// Bolt 1 to 3 never used minor versions, so they encode as plain integers
/// (`V3 = 0x0000_0003`), and Bolt 4.0 encodes as `0x0000_0004`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BoltVersion {
    /// Bolt 1 (Neo4j 3.0 - 3.3)
    V1 = 0x0000_0001,
    /// Bolt 2 (Neo4j 3.4) - Spatial and temporal types
    V2 = 0x0000_0002,
    /// Bolt 3 (Neo4j 3.5) - HELLO, GOODBYE, explicit transactions
    V3 = 0x0000_0003,
    /// Bolt 4.0 (Neo4j 4.0) - Multi-database, PULL/DISCARD with n
    V4_0 = 0x0000_0004,
}

impl BoltVersion {
    /// Get the raw u32 value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Major component of a raw encoded version.
pub fn major_of(value: u32) -> u8 {
    (value & 0xFF) as u8
}

/// Minor component of a raw encoded version.
pub fn minor_of(value: u32) -> u8 {
    ((value >> 8) & 0xFF) as u8
}

/// Human-readable `major.minor` for a raw encoded version.
pub fn format_version(value: u32) -> String {
    format!("{}.{}", major_of(value), minor_of(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_encoding() {
        assert_eq!(BoltVersion::V1.as_u32(), 1);
        assert_eq!(BoltVersion::V3.as_u32(), 3);
        assert_eq!(BoltVersion::V4_0.as_u32(), 0x0000_0004);
    }

    #[test]
    fn test_version_major_minor() {
        assert_eq!(major_of(0x0000_0304), 4);
        assert_eq!(minor_of(0x0000_0304), 3);
        assert_eq!(format_version(0x0000_0304), "4.3");
        assert_eq!(format_version(BoltVersion::V2.as_u32()), "2.0");
    }
}
