use pretty_assertions::assert_eq;
use resh_state::wire::FramedCodec;
use resh_state::{
    HostInstruction, HostMessage, StateError, TransportInstruction, UserInstruction, UserMessage,
};
use resh_test_utils::fixtures::data;
use test_case::test_case;

fn sample_host_message() -> HostMessage {
    HostMessage {
        instructions: vec![
            HostInstruction::EchoAck { ack_num: 17 },
            HostInstruction::Resize {
                width: 80,
                height: 24,
            },
            HostInstruction::HostBytes {
                bytes: b"\x1b[H\x1b[2Jprompt$ ".to_vec(),
            },
        ],
    }
}

#[test]
fn host_message_survives_framing() {
    let message = sample_host_message();
    let bytes = message.encode().unwrap();
    assert_eq!(HostMessage::decode(&bytes).unwrap(), message);
}

#[test]
fn adversarial_bytes_are_malformed() {
    assert!(matches!(
        HostMessage::decode(data::MISLEAD),
        Err(StateError::MalformedMessage(_))
    ));
    assert!(matches!(
        UserMessage::decode(data::MISLEAD),
        Err(StateError::MalformedMessage(_))
    ));
    assert!(TransportInstruction::decode(data::MISLEAD).is_err());
}

#[test_case(1 ; "one byte short")]
#[test_case(4 ; "payload missing a word")]
fn truncated_frame_is_rejected(cut: usize) {
    let bytes = sample_host_message().encode().unwrap();
    let truncated = &bytes[..bytes.len() - cut];
    assert!(matches!(
        HostMessage::decode(truncated),
        Err(StateError::MalformedMessage(_))
    ));
}

#[test]
fn frame_shorter_than_prefix_is_rejected() {
    assert!(HostMessage::decode(&[0, 0]).is_err());
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = sample_host_message().encode().unwrap();
    bytes.extend_from_slice(b"extra");
    assert!(matches!(
        HostMessage::decode(&bytes),
        Err(StateError::MalformedMessage(_))
    ));
}

#[test]
fn payload_garbage_fails_validation() {
    let mut bytes = FramedCodec::encode(&UserMessage {
        instructions: vec![UserInstruction::Keystroke {
            keys: b"abc".to_vec(),
        }],
    })
    .unwrap();
    for byte in bytes.iter_mut().skip(4) {
        *byte = 0xff;
    }
    assert!(UserMessage::decode(&bytes).is_err());
}

#[test_case(0, 24 ; "zero width")]
#[test_case(80, -1 ; "negative height")]
#[test_case(65536, 24 ; "width out of range")]
fn out_of_range_resize_is_malformed(width: i32, height: i32) {
    let bytes = UserMessage {
        instructions: vec![UserInstruction::Resize { width, height }],
    }
    .encode()
    .unwrap();
    assert!(matches!(
        UserMessage::decode(&bytes),
        Err(StateError::MalformedMessage(_))
    ));
}
