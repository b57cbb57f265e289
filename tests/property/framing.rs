//! Property tests for daemon message framing.
//!
//! 1. Any `DaemonRequest` survives framed encode and decode, and the
//!    consumed length equals the frame length.
//! 2. Two frames written back to back decode one after the other.
//! 3. Random bytes never panic `decode` or `decode_framed`.
//!
//! Verification command: `cargo test --test framing`

use proptest::prelude::*;
use tasksync_proto::codec::{self, MAX_FRAME_LEN, PREFIX_LEN};
use tasksync_proto::daemon::{DaemonRequest, DaemonResponse};

/// Host task lines are JSON text of arbitrary content.
fn arb_line() -> impl Strategy<Value = String> {
    "[^\x00]{0,512}"
}

fn arb_request() -> impl Strategy<Value = DaemonRequest> {
    prop_oneof![
        arb_line().prop_map(|task| DaemonRequest::OnAdd { task }),
        (arb_line(), arb_line()).prop_map(|(old, new)| DaemonRequest::OnModify { old, new }),
        any::<bool>().prop_map(|full| DaemonRequest::Sync { full }),
        Just(DaemonRequest::Status),
        Just(DaemonRequest::Stop),
    ]
}

fn arb_response() -> impl Strategy<Value = DaemonResponse> {
    prop_oneof![
        (arb_line(), arb_line()).prop_map(|(task, message)| DaemonResponse::Feedback { task, message }),
        (any::<u32>(), any::<u32>()).prop_map(|(pid, pending)| DaemonResponse::Status { pid, pending }),
        any::<u32>().prop_map(|changed| DaemonResponse::Synced { changed }),
        Just(DaemonResponse::Stopping),
        arb_line().prop_map(|reason| DaemonResponse::Error { reason }),
    ]
}

proptest! {
    #[test]
    fn request_survives_framing(request in arb_request()) {
        let frame = codec::encode_framed(&request).unwrap();
        let (decoded, consumed): (DaemonRequest, usize) = codec::decode_framed(&frame).unwrap();
        prop_assert_eq!(decoded, request);
        prop_assert_eq!(consumed, frame.len());
    }

    #[test]
    fn consecutive_frames_decode_in_order(
        first in arb_request(),
        second in arb_response(),
    ) {
        let mut stream = codec::encode_framed(&first).unwrap();
        stream.extend(codec::encode_framed(&second).unwrap());

        let (a, used): (DaemonRequest, usize) = codec::decode_framed(&stream).unwrap();
        let (b, rest): (DaemonResponse, usize) = codec::decode_framed(&stream[used..]).unwrap();
        prop_assert_eq!(a, first);
        prop_assert_eq!(b, second);
        prop_assert_eq!(used + rest, stream.len());
    }

    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = codec::decode::<DaemonRequest>(&bytes);
        let _ = codec::decode_framed::<DaemonResponse>(&bytes);
    }

    #[test]
    fn oversized_prefix_is_rejected(extra in 1u32..1024) {
        let len = u32::try_from(MAX_FRAME_LEN).unwrap() + extra;
        prop_assert!(codec::frame_len(len.to_le_bytes()).is_err());
    }
}

#[test]
fn truncated_frame_is_an_error() {
    let frame = codec::encode_framed(&DaemonRequest::OnAdd {
        task: r#"{"uuid":"x"}"#.into(),
    })
    .unwrap();
    assert!(codec::decode_framed::<DaemonRequest>(&frame[..frame.len() - 1]).is_err());
    assert!(codec::decode_framed::<DaemonRequest>(&frame[..PREFIX_LEN - 1]).is_err());
}
