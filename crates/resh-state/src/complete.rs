//! Server-side terminal state
//!
//! Wraps an [`Emulator`] together with the echo acknowledgement: the newest
//! user input frame the server is confident has been reflected in output
//! the client has seen.

use crate::wire::{HostInstruction, HostMessage};
use crate::{StateError, SyncState};
use resh_terminal::{Action, Display, Emulator, Resize};
use tracing::warn;

/// Milliseconds after which applied input is assumed to have been echoed
pub const ECHO_TIMEOUT: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InputFrame {
    frame_num: u64,
    timestamp: u64,
}

/// Decoded instruction, ready to apply
enum HostUpdate {
    Bytes(Vec<u8>),
    Resize(Resize),
    EchoAck(u64),
}

/// Terminal state synchronized from server to client
#[derive(Debug, Clone)]
pub struct Complete {
    terminal: Emulator,
    input_history: Vec<InputFrame>,
    echo_ack: u64,
    display: Display,
}

impl PartialEq for Complete {
    fn eq(&self, other: &Self) -> bool {
        self.terminal == other.terminal && self.echo_ack == other.echo_ack
    }
}

impl Complete {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            terminal: Emulator::new(width, height),
            input_history: Vec::new(),
            echo_ack: 0,
            display: Display::new(),
        }
    }

    /// Feed host output to the terminal, returning its replies
    pub fn act(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.terminal.handle_stream(bytes)
    }

    /// Apply one already decoded action, returning bytes for the host
    pub fn act_one(&mut self, action: &Action) -> Vec<u8> {
        self.terminal.act(action)
    }

    pub fn terminal(&self) -> &Emulator {
        &self.terminal
    }

    pub fn echo_ack(&self) -> u64 {
        self.echo_ack
    }

    /// Record that user frame `frame_num` was applied at `now`
    pub fn register_input_frame(&mut self, frame_num: u64, now: u64) {
        self.input_history.push(InputFrame {
            frame_num,
            timestamp: now,
        });
    }

    /// Advance the echo ack to the newest frame older than the timeout
    ///
    /// Returns whether the ack changed.
    pub fn set_echo_ack(&mut self, now: u64) -> bool {
        let newest = self
            .input_history
            .iter()
            .filter(|frame| frame.timestamp.saturating_add(ECHO_TIMEOUT) <= now)
            .map(|frame| frame.frame_num)
            .max()
            .unwrap_or(self.echo_ack)
            .max(self.echo_ack);

        self.input_history.retain(|frame| frame.frame_num >= newest);

        let changed = newest != self.echo_ack;
        self.echo_ack = newest;
        changed
    }

    /// Milliseconds until the echo ack may advance again, `u64::MAX` if
    /// nothing is pending
    pub fn wait_time(&self, now: u64) -> u64 {
        match self.input_history.get(1) {
            None => u64::MAX,
            Some(next) => next
                .timestamp
                .saturating_add(ECHO_TIMEOUT)
                .saturating_sub(now),
        }
    }

    fn decode(diff: &[u8]) -> Result<Vec<HostUpdate>, StateError> {
        // Sizes were range checked by HostMessage::decode
        Ok(HostMessage::decode(diff)?
            .instructions
            .into_iter()
            .map(|instruction| match instruction {
                HostInstruction::HostBytes { bytes } => HostUpdate::Bytes(bytes),
                HostInstruction::Resize { width, height } => {
                    HostUpdate::Resize(Resize::new(width as u16, height as u16))
                }
                HostInstruction::EchoAck { ack_num } => HostUpdate::EchoAck(ack_num),
            })
            .collect())
    }
}

impl SyncState for Complete {
    fn subtract(&mut self, _prefix: &Self) {}

    fn diff_from(&self, existing: &Self) -> Result<Vec<u8>, StateError> {
        let mut message = HostMessage::default();

        if existing.echo_ack != self.echo_ack {
            message.instructions.push(HostInstruction::EchoAck {
                ack_num: self.echo_ack,
            });
        }

        if existing.terminal.dimensions() != self.terminal.dimensions() {
            message.instructions.push(HostInstruction::Resize {
                width: i32::from(self.terminal.width()),
                height: i32::from(self.terminal.height()),
            });
        }

        let update = self
            .display
            .new_frame(true, &existing.terminal, &self.terminal);
        if !update.is_empty() {
            message
                .instructions
                .push(HostInstruction::HostBytes { bytes: update });
        }

        message.encode()
    }

    fn init_diff(&self) -> Result<Vec<u8>, StateError> {
        self.diff_from(&Complete::new(self.terminal.width(), self.terminal.height()))
    }

    fn apply_string(&mut self, diff: &[u8]) -> Result<(), StateError> {
        for update in Self::decode(diff)? {
            match update {
                HostUpdate::Bytes(bytes) => {
                    let reply = self.act(&bytes);
                    // The client never answers the host
                    if !reply.is_empty() {
                        warn!("Dropping {} bytes of terminal reply", reply.len());
                    }
                }
                HostUpdate::Resize(resize) => {
                    self.act_one(&Action::Resize(resize));
                }
                HostUpdate::EchoAck(ack_num) => self.echo_ack = ack_num,
            }
        }
        Ok(())
    }

    fn reset_input(&mut self) {
        self.terminal.reset_input();
    }
}
