//! Property-based tests for the wire codec.
//!
//! The decoder faces untrusted bytes straight off a socket, so the main
//! property is that it never panics and never accepts a frame whose declared
//! lengths overrun the buffer.

use parley_proto::{Direction, Frame, FrameReader, ProtocolError, Request};
use proptest::prelude::*;

fn arb_request() -> impl Strategy<Value = Request> {
    let name = "[a-zA-Z0-9_]{1,25}";
    prop_oneof![
        Just(Request::KeepAlive),
        name.prop_map(|name| Request::CreateAccount { name }),
        name.prop_map(|name| Request::LogIn { name }),
        (name, ".{0,100}").prop_map(|(receiver, text)| Request::SendMessage { receiver, text }),
        Just(Request::CheckMessage),
        Just(Request::DeleteAccount),
        "[a-z*?_\\[\\]!]{0,10}".prop_map(|pattern| Request::ListAccount { pattern }),
        Just(Request::Quit),
    ]
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = Frame::decode(&bytes);
    }

    #[test]
    fn stream_reader_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        block_on(async {
            let mut reader = FrameReader::new(&bytes[..], Direction::ClientToServer);
            // Drain until EOF or the first error
            while let Ok(Some(_)) = reader.read_next().await {}
        });
    }

    #[test]
    fn truncated_frames_are_rejected(request in arb_request(), cut in 1usize..16) {
        let wire = request.to_frame().encode().expect("encode");
        prop_assume!(wire.len() > 8);
        let cut = cut.min(wire.len() - 8);
        let truncated = &wire[..wire.len() - cut];

        // The buffer decoder sees fewer fields or an overrunning length
        match Frame::decode(truncated) {
            Ok(frame) => prop_assert!(Request::try_from(frame).is_err()),
            Err(err) => {
                let is_malformed = matches!(err, ProtocolError::MalformedMessage { .. });
                prop_assert!(is_malformed);
            },
        }
    }

    #[test]
    fn stream_reader_recovers_every_request(
        requests in proptest::collection::vec(arb_request(), 1..8)
    ) {
        let mut wire = Vec::new();
        for request in &requests {
            wire.extend_from_slice(&request.to_frame().encode().expect("encode"));
        }

        let decoded = block_on(async {
            let mut reader = FrameReader::new(&wire[..], Direction::ClientToServer);
            let mut out = Vec::new();
            while let Some(frame) = reader.read_next().await.expect("read") {
                out.push(Request::try_from(frame).expect("typed"));
            }
            out
        });

        prop_assert_eq!(decoded, requests);
    }
}
