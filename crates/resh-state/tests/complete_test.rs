use pretty_assertions::assert_eq;
use proptest::prelude::*;
use resh_state::{Complete, HostInstruction, HostMessage, StateError, SyncState, ECHO_TIMEOUT};
use resh_terminal::Emulator;
use resh_test_utils::fixtures::data;
use resh_test_utils::{screen_lines, TerminalComparator};
use test_case::test_case;

fn complete_with(width: u16, height: u16, host: &[u8]) -> Complete {
    let mut complete = Complete::new(width, height);
    complete.act(host);
    complete
}

/// Bring `a` to `b` through a diff, the way a client applies one
fn apply_diff(a: &mut Complete, b: &Complete) {
    let diff = b.diff_from(a).unwrap();
    a.reset_input();
    a.apply_string(&diff).unwrap();
}

#[test]
fn hello_at_seven_seven_is_one_host_bytes_instruction() {
    let blank = Complete::new(80, 40);
    let hello = complete_with(80, 40, b"\x1b[7;7Hhello");

    let message = HostMessage::decode(&hello.diff_from(&blank).unwrap()).unwrap();
    assert_eq!(message.instructions.len(), 1);
    let HostInstruction::HostBytes { bytes } = &message.instructions[0] else {
        panic!("expected host bytes, got {:?}", message.instructions[0]);
    };

    let mut replayed = Emulator::new(80, 40);
    replayed.handle_stream(bytes);
    assert_eq!(&replayed.framebuffer().row_text(6)[6..11], "hello");
    assert_eq!(&replayed, hello.terminal());
}

#[test_case(b"" ; "nothing")]
#[test_case(data::HELLO_WORLD.as_bytes() ; "hello world")]
#[test_case(data::UNICODE_TEST.as_bytes() ; "unicode")]
#[test_case(data::ANSI_COLORS.as_bytes() ; "colors")]
#[test_case(data::FULL_SCREEN_APP.as_bytes() ; "alternate screen")]
#[test_case(b"\x1b]0;title\x07\x1b[3;3H\x1b[Kx" ; "title")]
fn init_diff_reproduces_state(host: &[u8]) {
    let source = complete_with(30, 8, host);
    let mut client = Complete::new(30, 8);
    client.apply_string(&source.init_diff().unwrap()).unwrap();

    assert_eq!(client, source);
    TerminalComparator::new()
        .compare_screens(source.terminal(), client.terminal())
        .unwrap();
}

#[test]
fn diff_carries_resize_and_echo_ack() {
    let mut server = complete_with(20, 5, b"before");
    let mut client = server.clone();

    server.act_one(&resh_terminal::Action::Resize(resh_terminal::Resize::new(12, 3)));
    server.act(b"\r\nafter");
    server.register_input_frame(4, 0);
    assert!(server.set_echo_ack(ECHO_TIMEOUT));

    let message = HostMessage::decode(&server.diff_from(&client).unwrap()).unwrap();
    assert_eq!(
        message.instructions[..2],
        [
            HostInstruction::EchoAck { ack_num: 4 },
            HostInstruction::Resize {
                width: 12,
                height: 3
            },
        ]
    );

    apply_diff(&mut client, &server);
    assert_eq!(client, server);
    assert_eq!(client.echo_ack(), 4);
    assert_eq!(client.terminal().dimensions(), (12, 3));
}

#[test]
fn equal_states_diff_to_nothing() {
    let a = complete_with(40, 10, data::ANSI_COLORS.as_bytes());
    let b = a.clone();
    let diff = b.diff_from(&a).unwrap();
    assert!(diff.is_empty());

    let mut third = a.clone();
    third.apply_string(&diff).unwrap();
    assert_eq!(third, a);
}

#[test]
fn malformed_diff_leaves_state_unchanged() {
    let mut complete = complete_with(20, 4, data::HELLO_WORLD.as_bytes());
    let before = complete.clone();

    assert!(matches!(
        complete.apply_string(data::MISLEAD),
        Err(StateError::MalformedMessage(_))
    ));
    assert_eq!(complete, before);
    assert_eq!(screen_lines(complete.terminal())[0], "Hello, World!");
}

#[test]
fn bad_resize_is_rejected_before_anything_applies() {
    let message = HostMessage {
        instructions: vec![
            HostInstruction::HostBytes {
                bytes: b"partial".to_vec(),
            },
            HostInstruction::Resize {
                width: 0,
                height: 10,
            },
        ],
    };
    let bytes = message.encode().unwrap();

    let mut complete = Complete::new(20, 4);
    assert!(complete.apply_string(&bytes).is_err());
    assert_eq!(complete, Complete::new(20, 4));
}

#[test]
fn widest_screen_wraps_wide_char_at_right_margin() {
    let message = HostMessage {
        instructions: vec![
            HostInstruction::Resize {
                width: 65535,
                height: 1,
            },
            HostInstruction::HostBytes {
                bytes: "\x1b[1;65535H中".as_bytes().to_vec(),
            },
        ],
    };

    let mut complete = Complete::new(80, 24);
    complete.apply_string(&message.encode().unwrap()).unwrap();
    assert_eq!(complete.terminal().dimensions(), (65535, 1));
    assert_eq!(complete.terminal().framebuffer().cell_at(0, 0).unwrap().c, '中');
}

#[test]
fn oversized_screen_is_malformed() {
    let bytes = HostMessage {
        instructions: vec![HostInstruction::Resize {
            width: 65535,
            height: 65535,
        }],
    }
    .encode()
    .unwrap();

    let mut complete = Complete::new(80, 24);
    assert!(matches!(
        complete.apply_string(&bytes),
        Err(StateError::MalformedMessage(_))
    ));
    assert_eq!(complete.terminal().dimensions(), (80, 24));
}

fn host_chunk() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-zA-Z0-9 .,]{1,12}",
        1 => Just("中文".to_string()),
        1 => Just("\r\n".to_string()),
        1 => (1u8..=8, 1u8..=30).prop_map(|(row, col)| format!("\x1b[{row};{col}H")),
        1 => prop::sample::select(vec!["\x1b[1m", "\x1b[0m", "\x1b[31m", "\x1b[44m", "\x1b[7m"])
            .prop_map(str::to_string),
        1 => prop::sample::select(vec!["\x1b[K", "\x1b[1K", "\x1b[J", "\x1b[2J", "\x1b[2P", "\x1b[3@"])
            .prop_map(str::to_string),
    ]
}

proptest! {
    #[test]
    fn diff_then_apply_converges(
        a_host in prop::collection::vec(host_chunk(), 0..12),
        b_host in prop::collection::vec(host_chunk(), 0..12),
    ) {
        let mut a = complete_with(30, 8, a_host.concat().as_bytes());
        let b = complete_with(30, 8, b_host.concat().as_bytes());

        apply_diff(&mut a, &b);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn echo_ack_never_decreases(
        steps in prop::collection::vec((0u64..4, 0u64..40, 0u64..80, any::<bool>()), 1..40),
    ) {
        let mut complete = Complete::new(10, 2);
        let mut frame = 0u64;
        let mut timestamp = 0u64;
        let mut now = 0u64;
        let mut last_ack = 0u64;

        for (frame_step, time_step, now_step, register) in steps {
            timestamp += time_step;
            now = now.max(timestamp) + now_step;
            if register {
                frame += frame_step;
                complete.register_input_frame(frame, timestamp);
            }
            complete.set_echo_ack(now);
            prop_assert!(complete.echo_ack() >= last_ack);
            prop_assert!(complete.echo_ack() <= frame);
            last_ack = complete.echo_ack();
        }
    }
}
