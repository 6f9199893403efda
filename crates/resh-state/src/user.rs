//! Client input log
//!
//! Keystrokes and window resizes in the order they happened, diffed against
//! what the server has acknowledged.

use crate::wire::{UserInstruction, UserMessage};
use crate::{StateError, SyncState};
use resh_terminal::{Action, Resize};
use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

/// One user event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// One grapheme cluster typed by the user
    UserByte(String),
    Resize(Resize),
}

impl UserEvent {
    pub fn to_action(&self) -> Action {
        match self {
            UserEvent::UserByte(keys) => Action::UserByte(keys.clone()),
            UserEvent::Resize(resize) => Action::Resize(*resize),
        }
    }
}

/// Smallest piece of a stream that prefix matching looks at
///
/// Keystrokes are compared one character at a time so that the same typed
/// text matches no matter how it was grouped into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Char(char),
    Resize(Resize),
}

/// Ordered log of user events
///
/// Two streams are equal when they carry the same characters and resizes in
/// the same order, however the characters are grouped into events.
#[derive(Debug, Clone, Default)]
pub struct UserStream {
    actions: VecDeque<UserEvent>,
}

impl PartialEq for UserStream {
    fn eq(&self, other: &Self) -> bool {
        self.units().eq(other.units())
    }
}

impl Eq for UserStream {}

impl UserStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one keystroke; `keys` must be a single grapheme cluster
    pub fn push_back(&mut self, keys: &str) {
        self.actions.push_back(UserEvent::UserByte(keys.to_string()));
    }

    /// Append typed text, one event per grapheme cluster
    pub fn push_str(&mut self, text: &str) {
        for grapheme in text.graphemes(true) {
            self.push_back(grapheme);
        }
    }

    pub fn push_back_resize(&mut self, width: u16, height: u16) {
        self.actions
            .push_back(UserEvent::Resize(Resize::new(width, height)));
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn size(&self) -> usize {
        self.actions.len()
    }

    pub fn get_action(&self, index: usize) -> Option<Action> {
        self.actions.get(index).map(UserEvent::to_action)
    }

    pub fn events(&self) -> impl Iterator<Item = &UserEvent> {
        self.actions.iter()
    }

    fn units(&self) -> impl Iterator<Item = Unit> + '_ {
        self.actions.iter().flat_map(|event| {
            let (keys, resize) = match event {
                UserEvent::UserByte(keys) => (keys.as_str(), None),
                UserEvent::Resize(resize) => ("", Some(*resize)),
            };
            keys.chars().map(Unit::Char).chain(resize.map(Unit::Resize))
        })
    }

    /// Number of leading units shared with `other`
    fn common_prefix_len(&self, other: &Self) -> usize {
        self.units()
            .zip(other.units())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Remove `count` units from the front, splitting a keystroke if needed
    fn drop_front(&mut self, mut count: usize) {
        while count > 0 {
            let Some(front) = self.actions.front_mut() else {
                return;
            };
            match front {
                UserEvent::UserByte(keys) => {
                    match keys.char_indices().nth(count) {
                        Some((at, _)) => {
                            keys.drain(..at);
                            return;
                        }
                        None => count -= keys.chars().count(),
                    }
                }
                UserEvent::Resize(_) => count -= 1,
            }
            self.actions.pop_front();
        }
    }
}

impl SyncState for UserStream {
    fn subtract(&mut self, prefix: &Self) {
        let shared = self.common_prefix_len(prefix);
        self.drop_front(shared);
    }

    fn diff_from(&self, existing: &Self) -> Result<Vec<u8>, StateError> {
        let shared = self.common_prefix_len(existing);
        let mut message = UserMessage::default();

        for unit in self.units().skip(shared) {
            match unit {
                Unit::Char(c) => {
                    let mut buf = [0u8; 4];
                    let bytes = c.encode_utf8(&mut buf).as_bytes();
                    // Consecutive keystrokes share one instruction
                    if let Some(UserInstruction::Keystroke { keys }) =
                        message.instructions.last_mut()
                    {
                        keys.extend_from_slice(bytes);
                        continue;
                    }
                    message.instructions.push(UserInstruction::Keystroke {
                        keys: bytes.to_vec(),
                    });
                }
                Unit::Resize(resize) => message.instructions.push(UserInstruction::Resize {
                    width: i32::from(resize.width),
                    height: i32::from(resize.height),
                }),
            }
        }

        message.encode()
    }

    fn init_diff(&self) -> Result<Vec<u8>, StateError> {
        self.diff_from(&UserStream::default())
    }

    fn apply_string(&mut self, diff: &[u8]) -> Result<(), StateError> {
        let message = UserMessage::decode(diff)?;

        let mut events = Vec::new();
        for instruction in message.instructions {
            match instruction {
                UserInstruction::Keystroke { keys } => {
                    let text = String::from_utf8(keys).map_err(|e| {
                        StateError::MalformedMessage(format!("keystrokes are not UTF-8: {e}"))
                    })?;
                    events.extend(
                        text.graphemes(true)
                            .map(|g| UserEvent::UserByte(g.to_string())),
                    );
                }
                // Sizes were range checked by UserMessage::decode
                UserInstruction::Resize { width, height } => {
                    events.push(UserEvent::Resize(Resize::new(width as u16, height as u16)));
                }
            }
        }

        self.actions.extend(events);
        Ok(())
    }

    fn reset_input(&mut self) {}
}
