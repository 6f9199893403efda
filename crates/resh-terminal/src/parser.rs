//! Terminal escape sequence parser
//!
//! Drives the [`ParserState`] machine one Unicode scalar value at a time and
//! turns each transition into an ordered list of actions. Raw bytes go
//! through an incremental UTF-8 decoder first.

use crate::action::Action;
use crate::transition::ParserState;
use utf8parse::Receiver;

/// Collects the code point produced by one byte of UTF-8 input
#[derive(Default)]
struct Decoded(Option<char>);

impl Receiver for Decoded {
    fn codepoint(&mut self, c: char) {
        self.0 = Some(c);
    }

    fn invalid_sequence(&mut self) {
        self.0 = Some(char::REPLACEMENT_CHARACTER);
    }
}

/// Parser for terminal escape sequences
pub struct Parser {
    state: ParserState,
    utf8: utf8parse::Parser,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            state: ParserState::Ground,
            utf8: utf8parse::Parser::new(),
        }
    }
}

impl Clone for Parser {
    // A clone starts with an empty UTF-8 buffer; partial sequences are
    // transient input and are not part of the snapshot.
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            utf8: utf8parse::Parser::new(),
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").field("state", &self.state).finish()
    }
}

fn append(actions: &mut Vec<Action>, action: Action) {
    if !action.is_ignore() {
        actions.push(action);
    }
}

impl Parser {
    /// Create a new parser in the ground state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the machine
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Feed one Unicode scalar value, appending the resulting actions
    pub fn parse(&mut self, actions: &mut Vec<Action>, ch: char) {
        let transition = self.state.parse(ch);

        match transition.next_state {
            Some(next) => {
                append(actions, self.state.exit());
                append(actions, transition.action);
                append(actions, next.enter());
                self.state = next;
            }
            None => append(actions, transition.action),
        }
    }

    /// Feed one raw byte of UTF-8 encoded input
    pub fn input(&mut self, actions: &mut Vec<Action>, byte: u8) {
        let mut decoded = Decoded::default();
        self.utf8.advance(&mut decoded, byte);
        if let Some(ch) = decoded.0 {
            self.parse(actions, ch);
        }
    }

    /// Decode a chunk of bytes into actions
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Action> {
        let mut actions = Vec::with_capacity(bytes.len());
        for &byte in bytes {
            self.input(&mut actions, byte);
        }
        actions
    }

    /// Drop any partial sequence and return to the ground state
    pub fn reset_input(&mut self) {
        self.state = ParserState::Ground;
        self.utf8 = utf8parse::Parser::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_transition_enter_ordering() {
        let mut parser = Parser::new();
        let mut actions = Vec::new();

        for ch in "\x1b]0;hi\x07".chars() {
            parser.parse(&mut actions, ch);
        }

        assert_eq!(
            actions,
            vec![
                Action::Clear,
                Action::OscStart,
                Action::OscPut('0'),
                Action::OscPut(';'),
                Action::OscPut('h'),
                Action::OscPut('i'),
                Action::OscEnd,
            ]
        );
        assert_eq!(parser.state(), ParserState::Ground);
    }

    #[test]
    fn test_dcs_hook_and_unhook() {
        let mut parser = Parser::new();
        let actions = parser.feed(b"\x1bP1$rx\x1b\\");

        assert_eq!(
            actions,
            vec![
                Action::Clear,
                Action::Clear,
                Action::Param('1'),
                Action::Collect('$'),
                Action::Hook,
                Action::Put('x'),
                Action::Unhook,
                Action::Clear,
                Action::EscDispatch('\\'),
            ]
        );
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut parser = Parser::new();
        let bytes = "中".as_bytes();

        assert!(parser.feed(&bytes[..1]).is_empty());
        assert!(parser.feed(&bytes[1..2]).is_empty());
        assert_eq!(parser.feed(&bytes[2..]), vec![Action::Print('中')]);
    }

    #[test]
    fn test_invalid_utf8_prints_replacement() {
        let mut parser = Parser::new();
        let actions = parser.feed(&[0xff, b'a']);
        assert_eq!(
            actions,
            vec![Action::Print(char::REPLACEMENT_CHARACTER), Action::Print('a')]
        );
    }

    #[test]
    fn test_reset_input_returns_to_ground() {
        let mut parser = Parser::new();
        parser.feed(b"\x1b[12");
        assert_eq!(parser.state(), ParserState::CsiParam);

        parser.reset_input();
        assert_eq!(parser.state(), ParserState::Ground);
        assert_eq!(parser.feed(b"x"), vec![Action::Print('x')]);
    }
}
