//! Random bytes against the frame decoder
//!
//! Whatever arrives on a socket, decoding must fail cleanly or produce a
//! frame that re-encodes to the bytes it was read from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tandem_proto::{ClientEvent, Frame, FrameHeader, ServerEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    // INVARIANT 1: the header never claims more than the limit
    assert!(frame.header.payload_len() <= FrameHeader::MAX_PAYLOAD_SIZE);
    assert_eq!(frame.header.payload_len(), frame.payload.len());

    // INVARIANT 2: re-encoding reproduces the consumed prefix, except the
    // reserved byte which is always written as zero
    let mut buf = Vec::new();
    frame.encode(&mut buf).expect("decoded frame re-encodes");
    assert_eq!(buf.len(), frame.encoded_len());
    assert_eq!(buf[..3], data[..3]);
    assert_eq!(buf[4..], data[4..buf.len()]);

    // INVARIANT 3: a frame decodes in at most one direction
    let client = ClientEvent::from_frame(&frame);
    let server = ServerEvent::from_frame(&frame);
    assert!(client.is_err() || server.is_err(), "frame decoded as both directions");

    // INVARIANT 4: payload errors never ask for the stream to close
    if let Err(e) = client {
        let opcode = frame.header.opcode_enum();
        if opcode.is_some_and(|op| op.is_client_request()) {
            assert!(!e.is_fatal(), "payload error treated as fatal: {e}");
        }
    }
});
