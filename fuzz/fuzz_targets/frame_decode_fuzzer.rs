//! Fuzz target for the frame decoder
//!
//! Frames arrive straight off a socket, so every byte is attacker-chosen.
//!
//! # Strategy
//!
//! - Raw bytes: feed the input to `Frame::decode` unchanged
//! - Typed layer: convert any decoded frame into `Request` and
//!   `ServerMessage`
//! - Re-encode: anything that decodes is encoded again
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A decoded frame re-encodes to exactly the input bytes
//! - A typed request re-encodes to a frame that decodes to the same request

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{Frame, Request, ServerMessage};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let wire = frame.encode().expect("decoded frame must re-encode");
    assert_eq!(&wire[..], data, "decode/encode must be lossless");

    if let Ok(request) = Request::try_from(frame.clone()) {
        let again = Frame::decode(&request.to_frame().encode().expect("encode request"))
            .expect("encoded request must decode");
        assert_eq!(Request::try_from(again).ok(), Some(request));
    }

    let _ = ServerMessage::try_from(frame);
});
