//! Parley wire protocol.
//!
//! Every message, in both directions, is a fixed 8-byte header followed by
//! zero or more length-prefixed UTF-8 fields:
//!
//! ```text
//! +-------------+------------+-------------+-----------+-----+
//! | version u32 | opcode u32 | len u32     | utf8 ...  | ... |
//! +-------------+------------+-------------+-----------+-----+
//! ```
//!
//! All integers are big-endian. The number of fields is fixed per opcode and
//! direction (see [`Direction::arity`]), which is what lets a stream reader
//! find frame boundaries without an outer length prefix.
//!
//! ## Layers
//!
//! - [`FrameHeader`]: zero-copy view of the 8-byte header
//! - [`Frame`]: raw `(version, opcode, fields)` triple with encode/decode
//! - [`Request`] / [`ServerMessage`]: typed messages built on top of frames
//! - [`FrameReader`]: async reader that pulls one frame at a time off a stream

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod header;
mod message;
mod reader;

pub use error::ProtocolError;
pub use frame::{Direction, Frame};
pub use header::FrameHeader;
pub use message::{ReplyCode, Request, ServerMessage, opcode};
pub use reader::FrameReader;

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Upper bound on a single field, enforced by the stream reader.
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Maximum account name length in bytes.
pub const MAX_NAME_LEN: usize = 25;

/// Maximum message text length in bytes (client-side convention).
pub const MAX_TEXT_LEN: usize = 100;

/// Check that an account name is between 1 and [`MAX_NAME_LEN`] bytes.
pub fn validate_account_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN
}
