//! Raw frames: header plus length-prefixed fields.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, IntoBytes};

use crate::{HEADER_SIZE, ProtocolError, header::FrameHeader, opcode};

/// Which way a frame travels. Determines the field count of each opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Requests sent by a client.
    ClientToServer,
    /// Replies, pushes and challenges sent by the server.
    ServerToClient,
}

impl Direction {
    /// Number of fields carried by opcode `code` in this direction, or `None` if
    /// the opcode is not valid here.
    pub fn arity(self, code: u32) -> Option<usize> {
        match self {
            Self::ClientToServer => match code {
                opcode::KEEP_ALIVE
                | opcode::CHECK_MESSAGE
                | opcode::DELETE_ACCOUNT
                | opcode::QUIT => Some(0),
                opcode::CREATE_ACCOUNT | opcode::LOG_IN | opcode::LIST_ACCOUNT => Some(1),
                opcode::SEND_MESSAGE => Some(2),
                _ => None,
            },
            Self::ServerToClient => match code {
                opcode::KEEP_ALIVE => Some(0),
                1..=16 | opcode::DELIVERY | 18 => Some(1),
                opcode::CHALLENGE => Some(2),
                _ => None,
            },
        }
    }
}

/// A decoded frame before it is interpreted as a typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version from the header.
    pub version: u32,
    /// Operation code from the header.
    pub opcode: u32,
    /// Variable-length fields, in order.
    pub fields: Vec<String>,
}

impl Frame {
    /// Create a frame.
    pub fn new(version: u32, opcode: u32, fields: Vec<String>) -> Self {
        Self { version, opcode, fields }
    }

    /// Header for this frame.
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.version, self.opcode)
    }

    /// Number of bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.fields.iter().map(|f| 4 + f.len()).sum::<usize>()
    }

    /// Append the wire encoding of this frame to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(self.encoded_len());
        dst.put_slice(self.header().as_bytes());
        for field in &self.fields {
            let len = u32::try_from(field.len()).map_err(|_| {
                ProtocolError::malformed(format!(
                    "field of {} bytes cannot be encoded",
                    field.len()
                ))
            })?;
            dst.put_u32(len);
            dst.put_slice(field.as_bytes());
        }
        Ok(())
    }

    /// Encode this frame into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a complete frame from `buf`.
    ///
    /// Fields are consumed until the buffer is exhausted; no arity check is
    /// applied here (see [`crate::FrameReader`] for stream decoding).
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedMessage` if the header is truncated, a
    /// declared length exceeds the remaining bytes, or a field is not UTF-8.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let (head, mut rest) = buf.split_at_checked(HEADER_SIZE).ok_or_else(|| {
            ProtocolError::malformed(format!("header needs {HEADER_SIZE} bytes, got {}", buf.len()))
        })?;
        let header = FrameHeader::ref_from_bytes(head)
            .map_err(|_| ProtocolError::malformed("invalid frame header"))?;

        let mut fields = Vec::new();
        while !rest.is_empty() {
            let (prefix, tail) = rest
                .split_at_checked(4)
                .ok_or_else(|| ProtocolError::malformed("truncated field length prefix"))?;
            let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            let (body, tail) = tail.split_at_checked(len).ok_or_else(|| {
                ProtocolError::malformed(format!(
                    "field length {len} exceeds remaining {} bytes",
                    tail.len()
                ))
            })?;
            fields.push(decode_utf8(body.to_vec())?);
            rest = tail;
        }

        Ok(Self { version: header.version(), opcode: header.opcode(), fields })
    }
}

pub(crate) fn decode_utf8(bytes: Vec<u8>) -> Result<String, ProtocolError> {
    String::from_utf8(bytes)
        .map_err(|e| ProtocolError::malformed(format!("field is not utf-8: {e}")))
}
