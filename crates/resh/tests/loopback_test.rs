use pretty_assertions::assert_eq;
use resh::{LoopbackSession, SessionConfig, DEFAULT_MTU};
use resh_state::CompressionAlgorithm;
use resh_test_utils::fixtures::data;
use resh_test_utils::{init_test_logging, screen_lines, TerminalComparator};
use test_case::test_case;

/// Run until synchronized, echoing host-bound bytes like a shell would
fn run_until_synchronized(session: &mut LoopbackSession, start: u64) -> u64 {
    let mut now = start;
    for _ in 0..500 {
        let to_host = session.step(now).unwrap();
        session.host_output(&to_host);
        now += 10;
        if session.is_synchronized() {
            return now;
        }
    }
    panic!("session did not synchronize");
}

/// Step for `duration` milliseconds regardless of state
fn run_for(session: &mut LoopbackSession, start: u64, duration: u64) -> u64 {
    let mut now = start;
    while now < start + duration {
        let to_host = session.step(now).unwrap();
        session.host_output(&to_host);
        now += 10;
    }
    now
}

fn session(width: u16, height: u16, drop_every: usize) -> LoopbackSession {
    session_with_mtu(width, height, drop_every, DEFAULT_MTU)
}

fn session_with_mtu(width: u16, height: u16, drop_every: usize, mtu: usize) -> LoopbackSession {
    init_test_logging();
    LoopbackSession::new(SessionConfig {
        width,
        height,
        compression: CompressionAlgorithm::Zstd,
        drop_every,
        mtu,
    })
    .unwrap()
}

/// Bytes the host receives over `steps` steps, without echoing them
fn collect_to_host(session: &mut LoopbackSession, start: u64, steps: u64) -> Vec<u8> {
    let mut to_host = Vec::new();
    for i in 0..steps {
        to_host.extend(session.step(start + i * 10).unwrap());
    }
    to_host
}

#[test_case(0 ; "lossless")]
#[test_case(2 ; "every other packet lost")]
#[test_case(5 ; "every fifth packet lost")]
fn host_output_converges(drop_every: usize) {
    let mut session = session(40, 8, drop_every);
    session.host_output(data::HELLO_WORLD.as_bytes());
    session.host_output(data::ANSI_COLORS.as_bytes());
    session.host_output(data::UNICODE_TEST.as_bytes());
    run_until_synchronized(&mut session, 0);

    TerminalComparator::new()
        .compare_screens(session.server_screen(), session.client_screen())
        .unwrap();
    assert_eq!(screen_lines(session.client_screen())[0], "Hello, World!");
}

#[test_case(0 ; "lossless")]
#[test_case(3 ; "every third packet lost")]
fn typed_keys_are_echoed_and_acknowledged(drop_every: usize) {
    let mut session = session(30, 5, drop_every);
    session.host_output(b"$ ");
    session.type_keys("echo 你好");
    let now = run_until_synchronized(&mut session, 0);

    assert_eq!(screen_lines(session.client_screen())[0], "$ echo 你好");

    // The echo ack trails the input by the echo timeout
    session.type_keys("!");
    let now = run_until_synchronized(&mut session, now);
    let now = run_for(&mut session, now, 100);
    run_until_synchronized(&mut session, now);
    assert_eq!(session.client_echo_ack(), 2);
    assert_eq!(screen_lines(session.client_screen())[0], "$ echo 你好!");
}

#[test]
fn window_resize_reaches_the_client() {
    let mut session = session(20, 4, 0);
    session.host_output(b"top line");
    session.resize(12, 6);
    run_until_synchronized(&mut session, 0);

    assert_eq!(session.server_screen().dimensions(), (12, 6));
    assert_eq!(session.client_screen().dimensions(), (12, 6));
    assert_eq!(session.client_screen(), session.server_screen());
}

#[test]
fn full_screen_program_is_mirrored() {
    let mut session = session(30, 8, 4);
    session.host_output(data::generate_text_lines(12).as_bytes());
    session.host_output(data::FULL_SCREEN_APP.as_bytes());
    run_until_synchronized(&mut session, 0);

    let client = session.client_screen();
    assert!(!client.framebuffer().cursor_visible());
    assert_eq!(screen_lines(client)[0], " top");
    assert_eq!(screen_lines(client)[4], "         body");
}

#[test]
fn terminal_replies_go_back_to_the_host() {
    let mut session = session(20, 4, 0);
    session.host_output(b"ab");
    assert_eq!(session.host_output(b"\x1b[6n"), b"\x1b[1;3R");
    assert_eq!(session.host_output(b"\x1b[5n"), b"\x1b[0n");
}

#[test_case("\r", "\n" ; "line feed after carriage return")]
#[test_case("e", "\u{301}" ; "combining accent after its base")]
#[test_case("\u{1F1E8}", "\u{1F1F3}" ; "second half of a flag")]
fn keys_joining_an_unacked_cluster_reach_the_host_once(first: &str, second: &str) {
    let mut session = session(20, 4, 0);
    session.type_keys(first);
    session.step(0).unwrap();
    session.type_keys(second);

    let to_host = collect_to_host(&mut session, 10, 40);
    assert_eq!(String::from_utf8(to_host).unwrap(), format!("{first}{second}"));
}

#[test_case(0 ; "lossless")]
#[test_case(3 ; "every third datagram lost")]
fn keys_typed_over_several_steps_reach_the_host_once(drop_every: usize) {
    let mut session = session(20, 4, drop_every);
    let keys = ["l", "s", "\r", "\n", "e", "\u{301}", "中", "\x7f"];
    let mut to_host = Vec::new();
    let mut now = 0;
    for key in keys {
        session.type_keys(key);
        to_host.extend(session.step(now).unwrap());
        now += 10;
    }
    to_host.extend(collect_to_host(&mut session, now, 100));

    assert_eq!(String::from_utf8(to_host).unwrap(), keys.concat());
}

#[test]
fn predicted_echo_clears_once_acknowledged() {
    let mut session = session(30, 5, 0);
    session.host_output(b"$ ");
    session.type_keys("echo hi");
    session.type_keys("\r");
    assert_eq!(session.predicted_echo(), "echo hi");

    let now = run_until_synchronized(&mut session, 0);
    let now = run_for(&mut session, now, 100);
    run_until_synchronized(&mut session, now);

    assert_eq!(session.pending_predictions(), 0);
    assert_eq!(session.predicted_echo(), "");
    assert_eq!(screen_lines(session.client_screen())[0], "$ echo hi");
}

#[test_case(0 ; "lossless")]
#[test_case(3 ; "every third datagram lost")]
fn small_mtu_still_converges(drop_every: usize) {
    let mut session = session_with_mtu(40, 10, drop_every, 48);
    session.host_output(data::generate_text_lines(10).as_bytes());
    session.host_output(data::UNICODE_TEST.as_bytes());
    run_until_synchronized(&mut session, 0);

    assert!(session.downstream_stats().sent > 1);
    assert_eq!(session.client_screen(), session.server_screen());
}
