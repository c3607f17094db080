//! Fixed frame header.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::HEADER_SIZE;

/// The 8-byte header that starts every frame.
///
/// Laid out exactly as it appears on the wire so it can be parsed in place
/// with `FrameHeader::ref_from_bytes`.
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    version: U32<BigEndian>,
    opcode: U32<BigEndian>,
}

const _: () = assert!(std::mem::size_of::<FrameHeader>() == HEADER_SIZE);

impl FrameHeader {
    /// Create a header.
    pub fn new(version: u32, opcode: u32) -> Self {
        Self { version: U32::new(version), opcode: U32::new(opcode) }
    }

    /// Protocol version.
    pub fn version(&self) -> u32 {
        self.version.get()
    }

    /// Operation code.
    pub fn opcode(&self) -> u32 {
        self.opcode.get()
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("version", &self.version())
            .field("opcode", &self.opcode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn header_is_big_endian() {
        let header = FrameHeader::new(1, 17);
        assert_eq!(header.as_bytes(), hex!("00000001 00000011"));
    }

    #[test]
    fn header_parses_in_place() {
        let bytes = hex!("00000002 00000006");
        let header = FrameHeader::ref_from_bytes(&bytes[..]).unwrap();
        assert_eq!(header.version(), 2);
        assert_eq!(header.opcode(), 6);
    }

    #[test]
    fn short_buffer_rejected() {
        let bytes = hex!("00000001 000000");
        assert!(FrameHeader::ref_from_bytes(&bytes[..]).is_err());
    }
}
