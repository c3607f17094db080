//! Async stream decoding.

use tokio::io::{AsyncRead, AsyncReadExt};
use zerocopy::FromBytes;

use crate::{
    Direction, Frame, HEADER_SIZE, MAX_FIELD_LEN, PROTOCOL_VERSION, ProtocolError,
    frame::decode_utf8, header::FrameHeader, opcode,
};

/// Reads frames one at a time from a byte stream.
///
/// Frame boundaries come from the per-opcode field count, so the header is
/// validated (version, opcode) before any field is read.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    direction: Direction,
    max_field_len: usize,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a reader for frames travelling in `direction`.
    pub fn new(reader: R, direction: Direction) -> Self {
        Self { reader, direction, max_field_len: MAX_FIELD_LEN }
    }

    /// Override the per-field size limit.
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len;
        self
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly between
    /// frames. Keep-alive frames (opcode 0) are returned without checking the
    /// version.
    ///
    /// # Errors
    ///
    /// - `VersionMismatch` if the header carries another version
    /// - `UnknownOpcode` if the opcode is not valid for this direction
    /// - `MalformedMessage` if a field exceeds the size limit or is not UTF-8
    /// - `Io` on stream failure, including EOF in the middle of a frame
    pub async fn read_next(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let mut buf = [0u8; HEADER_SIZE];
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        self.reader.read_exact(&mut buf[n..]).await?;

        let header = FrameHeader::read_from_bytes(&buf[..])
            .map_err(|_| ProtocolError::malformed("invalid frame header"))?;

        if header.opcode() == opcode::KEEP_ALIVE {
            return Ok(Some(Frame::new(header.version(), opcode::KEEP_ALIVE, Vec::new())));
        }

        if header.version() != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: header.version(),
            });
        }

        let arity = self
            .direction
            .arity(header.opcode())
            .ok_or(ProtocolError::UnknownOpcode(header.opcode()))?;

        let mut fields = Vec::with_capacity(arity);
        for _ in 0..arity {
            let len = self.reader.read_u32().await? as usize;
            if len > self.max_field_len {
                return Err(ProtocolError::malformed(format!(
                    "field length {len} exceeds limit {}",
                    self.max_field_len
                )));
            }
            let mut body = vec![0u8; len];
            self.reader.read_exact(&mut body).await?;
            fields.push(decode_utf8(body)?);
        }

        Ok(Some(Frame::new(header.version(), header.opcode(), fields)))
    }
}
