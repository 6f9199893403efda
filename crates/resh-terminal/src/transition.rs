//! Parser states and their transition tables
//!
//! Follows the DEC ANSI parser state diagram from vt100.net with two
//! deviations: GR code points are handled exactly like GL, and the C1
//! controls get their own "anywhere" transitions.

use crate::action::Action;

/// One state of the control-sequence parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    SosPmApcString,
}

/// The action to perform for one symbol and the state to move to
///
/// `next_state == None` means stay in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub next_state: Option<ParserState>,
}

impl Transition {
    fn stay(action: Action) -> Self {
        Self {
            action,
            next_state: None,
        }
    }

    fn to(action: Action, next: ParserState) -> Self {
        Self {
            action,
            next_state: Some(next),
        }
    }

    fn ignore() -> Self {
        Self::stay(Action::Ignore)
    }
}

/// C0 controls not already claimed by an anywhere rule
fn is_c0_prime(r: u32) -> bool {
    r <= 0x17 || r == 0x19 || (0x1C..=0x1F).contains(&r)
}

/// Rules that fire regardless of the current state
fn anywhere(r: u32, ch: char) -> Option<Transition> {
    use ParserState::*;

    let transition = match r {
        0x18 | 0x1A | 0x80..=0x8F | 0x91..=0x97 | 0x99 | 0x9A => {
            Transition::to(Action::Execute(ch), Ground)
        }
        0x9C => Transition::to(Action::Ignore, Ground),
        0x1B => Transition::to(Action::Ignore, Escape),
        0x98 | 0x9E | 0x9F => Transition::to(Action::Ignore, SosPmApcString),
        0x90 => Transition::to(Action::Ignore, DcsEntry),
        0x9D => Transition::to(Action::Ignore, OscString),
        0x9B => Transition::to(Action::Ignore, CsiEntry),
        _ => return None,
    };
    Some(transition)
}

impl ParserState {
    pub const ALL: [ParserState; 14] = [
        ParserState::Ground,
        ParserState::Escape,
        ParserState::EscapeIntermediate,
        ParserState::CsiEntry,
        ParserState::CsiParam,
        ParserState::CsiIntermediate,
        ParserState::CsiIgnore,
        ParserState::DcsEntry,
        ParserState::DcsParam,
        ParserState::DcsIntermediate,
        ParserState::DcsPassthrough,
        ParserState::DcsIgnore,
        ParserState::OscString,
        ParserState::SosPmApcString,
    ];

    /// Action emitted when the parser moves into this state
    pub fn enter(self) -> Action {
        match self {
            ParserState::Escape | ParserState::CsiEntry | ParserState::DcsEntry => Action::Clear,
            ParserState::DcsPassthrough => Action::Hook,
            ParserState::OscString => Action::OscStart,
            _ => Action::Ignore,
        }
    }

    /// Action emitted when the parser leaves this state
    pub fn exit(self) -> Action {
        match self {
            ParserState::DcsPassthrough => Action::Unhook,
            ParserState::OscString => Action::OscEnd,
            _ => Action::Ignore,
        }
    }

    /// Resolve the transition for one input symbol
    ///
    /// Anywhere rules are checked first. Code points from 0xA0 up are then
    /// classified as if they were `'A'`, but the returned action still
    /// carries the original symbol.
    pub fn parse(self, ch: char) -> Transition {
        let r = ch as u32;
        if let Some(transition) = anywhere(r, ch) {
            return transition;
        }

        let folded = if r >= 0xA0 { 0x41 } else { r };
        self.event(folded, ch)
    }

    fn event(self, r: u32, ch: char) -> Transition {
        use ParserState::*;

        match self {
            Ground => {
                if is_c0_prime(r) {
                    Transition::stay(Action::Execute(ch))
                } else if (0x20..=0x7F).contains(&r) {
                    Transition::stay(Action::Print(ch))
                } else {
                    Transition::ignore()
                }
            }

            Escape => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Execute(ch)),
                0x20..=0x2F => Transition::to(Action::Collect(ch), EscapeIntermediate),
                0x30..=0x4F | 0x51..=0x57 | 0x59 | 0x5A | 0x5C | 0x60..=0x7E => {
                    Transition::to(Action::EscDispatch(ch), Ground)
                }
                0x5B => Transition::to(Action::Ignore, CsiEntry),
                0x5D => Transition::to(Action::Ignore, OscString),
                0x50 => Transition::to(Action::Ignore, DcsEntry),
                0x58 | 0x5E | 0x5F => Transition::to(Action::Ignore, SosPmApcString),
                _ => Transition::ignore(),
            },

            EscapeIntermediate => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Execute(ch)),
                0x20..=0x2F => Transition::stay(Action::Collect(ch)),
                0x30..=0x7E => Transition::to(Action::EscDispatch(ch), Ground),
                _ => Transition::ignore(),
            },

            CsiEntry => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Execute(ch)),
                0x40..=0x7E => Transition::to(Action::CsiDispatch(ch), Ground),
                0x30..=0x39 | 0x3B => Transition::to(Action::Param(ch), CsiParam),
                0x3C..=0x3F => Transition::to(Action::Collect(ch), CsiParam),
                0x3A => Transition::to(Action::Ignore, CsiIgnore),
                0x20..=0x2F => Transition::to(Action::Collect(ch), CsiIntermediate),
                _ => Transition::ignore(),
            },

            CsiParam => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Execute(ch)),
                0x30..=0x39 | 0x3B => Transition::stay(Action::Param(ch)),
                0x3A | 0x3C..=0x3F => Transition::to(Action::Ignore, CsiIgnore),
                0x20..=0x2F => Transition::to(Action::Collect(ch), CsiIntermediate),
                0x40..=0x7E => Transition::to(Action::CsiDispatch(ch), Ground),
                _ => Transition::ignore(),
            },

            CsiIntermediate => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Execute(ch)),
                0x20..=0x2F => Transition::stay(Action::Collect(ch)),
                0x40..=0x7E => Transition::to(Action::CsiDispatch(ch), Ground),
                0x30..=0x3F => Transition::to(Action::Ignore, CsiIgnore),
                _ => Transition::ignore(),
            },

            CsiIgnore => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Execute(ch)),
                0x40..=0x7E => Transition::to(Action::Ignore, Ground),
                _ => Transition::ignore(),
            },

            DcsEntry => match r {
                _ if is_c0_prime(r) => Transition::ignore(),
                0x20..=0x2F => Transition::to(Action::Collect(ch), DcsIntermediate),
                0x3A => Transition::to(Action::Ignore, DcsIgnore),
                0x30..=0x39 | 0x3B => Transition::to(Action::Param(ch), DcsParam),
                0x3C..=0x3F => Transition::to(Action::Collect(ch), DcsParam),
                0x40..=0x7E => Transition::to(Action::Ignore, DcsPassthrough),
                _ => Transition::ignore(),
            },

            DcsParam => match r {
                _ if is_c0_prime(r) => Transition::ignore(),
                0x30..=0x39 | 0x3B => Transition::stay(Action::Param(ch)),
                0x3A | 0x3C..=0x3F => Transition::to(Action::Ignore, DcsIgnore),
                0x20..=0x2F => Transition::to(Action::Collect(ch), DcsIntermediate),
                0x40..=0x7E => Transition::to(Action::Ignore, DcsPassthrough),
                _ => Transition::ignore(),
            },

            DcsIntermediate => match r {
                _ if is_c0_prime(r) => Transition::ignore(),
                0x20..=0x2F => Transition::stay(Action::Collect(ch)),
                0x40..=0x7E => Transition::to(Action::Ignore, DcsPassthrough),
                0x30..=0x3F => Transition::to(Action::Ignore, DcsIgnore),
                _ => Transition::ignore(),
            },

            DcsPassthrough => match r {
                _ if is_c0_prime(r) => Transition::stay(Action::Put(ch)),
                0x20..=0x7E => Transition::stay(Action::Put(ch)),
                0x9C => Transition::to(Action::Ignore, Ground),
                _ => Transition::ignore(),
            },

            DcsIgnore | SosPmApcString => match r {
                0x9C => Transition::to(Action::Ignore, Ground),
                _ => Transition::ignore(),
            },

            OscString => match r {
                // BEL ends the string (xterm)
                0x07 => Transition::to(Action::Ignore, Ground),
                _ if is_c0_prime(r) => Transition::ignore(),
                0x20..=0x7F => Transition::stay(Action::OscPut(ch)),
                0x9C => Transition::to(Action::Ignore, Ground),
                _ => Transition::ignore(),
            },
        }
    }
}
