use pretty_assertions::assert_eq;
use proptest::prelude::*;
use resh_terminal::{Action, Parser, ParserState};

fn feed_str(parser: &mut Parser, input: &str) -> Vec<Action> {
    let mut actions = Vec::new();
    for ch in input.chars() {
        parser.parse(&mut actions, ch);
    }
    actions
}

#[test]
fn every_state_handles_every_byte() {
    for state in ParserState::ALL {
        for byte in 0u32..=0xFF {
            let ch = char::from_u32(byte).unwrap();
            let transition = state.parse(ch);
            if let Some(symbol) = transition.action.symbol() {
                assert_eq!(symbol, ch, "{state:?} {byte:#04x}");
            }
        }
    }
}

#[test]
fn ground_prints_the_printable_range() {
    let mut parser = Parser::new();
    let input: String = (0x20u8..=0x7E).map(char::from).collect();
    let actions = feed_str(&mut parser, &input);

    let expected: Vec<Action> = input.chars().map(Action::Print).collect();
    assert_eq!(actions, expected);
    assert_eq!(parser.state(), ParserState::Ground);
}

#[test]
fn escape_round_trip() {
    let mut parser = Parser::new();
    let letters: String = ('A'..='Z').collect();
    let input = format!("\x1b[4;4H{letters}\x1b[0K");
    let actions = feed_str(&mut parser, &input);

    let mut expected = vec![
        Action::Clear,
        Action::Clear,
        Action::Param('4'),
        Action::Param(';'),
        Action::Param('4'),
        Action::CsiDispatch('H'),
    ];
    expected.extend(letters.chars().map(Action::Print));
    expected.extend([
        Action::Clear,
        Action::Clear,
        Action::Param('0'),
        Action::CsiDispatch('K'),
    ]);

    assert_eq!(actions, expected);
    assert_eq!(parser.state(), ParserState::Ground);
}

#[test]
fn escape_wins_from_every_state() {
    for state in ParserState::ALL {
        let transition = state.parse('\x1b');
        assert_eq!(transition.next_state, Some(ParserState::Escape), "{state:?}");
    }
}

#[test]
fn cancel_and_substitute_execute_and_return_to_ground() {
    for state in ParserState::ALL {
        for ch in ['\x18', '\x1a'] {
            let transition = state.parse(ch);
            assert_eq!(transition.action, Action::Execute(ch));
            assert_eq!(transition.next_state, Some(ParserState::Ground));
        }
    }
}

#[test]
fn c1_string_introducers() {
    let cases = [
        ('\u{90}', ParserState::DcsEntry),
        ('\u{9b}', ParserState::CsiEntry),
        ('\u{9d}', ParserState::OscString),
        ('\u{98}', ParserState::SosPmApcString),
        ('\u{9e}', ParserState::SosPmApcString),
        ('\u{9f}', ParserState::SosPmApcString),
        ('\u{9c}', ParserState::Ground),
    ];
    for state in ParserState::ALL {
        for (ch, target) in cases {
            assert_eq!(state.parse(ch).next_state, Some(target), "{state:?} {ch:?}");
        }
    }
}

#[test]
fn private_mode_sequence_collects_marker() {
    let mut parser = Parser::new();
    let actions = parser.feed(b"\x1b[?25l");
    assert_eq!(
        actions,
        vec![
            Action::Clear,
            Action::Clear,
            Action::Collect('?'),
            Action::Param('2'),
            Action::Param('5'),
            Action::CsiDispatch('l'),
        ]
    );
}

#[test]
fn execute_inside_csi_keeps_state() {
    let mut parser = Parser::new();
    let actions = parser.feed(b"\x1b[1\r2H");
    assert_eq!(
        actions,
        vec![
            Action::Clear,
            Action::Clear,
            Action::Param('1'),
            Action::Execute('\r'),
            Action::Param('2'),
            Action::CsiDispatch('H'),
        ]
    );
}

#[test]
fn sos_string_swallows_content() {
    let mut parser = Parser::new();
    let actions = parser.feed(b"\x1bXsecret\x1b\\ok");
    assert_eq!(
        actions,
        vec![
            Action::Clear,
            Action::Clear,
            Action::EscDispatch('\\'),
            Action::Print('o'),
            Action::Print('k'),
        ]
    );
}

proptest! {
    #[test]
    fn parser_never_emits_ignore(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut parser = Parser::new();
        let actions = parser.feed(&bytes);
        prop_assert!(actions.iter().all(|a| !a.is_ignore()));
    }

    #[test]
    fn chunking_does_not_change_actions(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        split in 0usize..256,
    ) {
        let split = split.min(bytes.len());
        let mut whole = Parser::new();
        let expected = whole.feed(&bytes);

        let mut chunked = Parser::new();
        let mut actions = chunked.feed(&bytes[..split]);
        actions.extend(chunked.feed(&bytes[split..]));

        prop_assert_eq!(actions, expected);
        prop_assert_eq!(chunked.state(), whole.state());
    }
}
