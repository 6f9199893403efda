//! State synchronization protocol implementation
//!
//! Manages state numbers, acknowledgments, and diffs between the two ends
//! of a session. Each end sends its own state and receives the peer's.

use crate::{
    compress::{CompressionAlgorithm, Compressor},
    wire::FramedCodec,
    StateError, SyncState,
};
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

pub const PROTOCOL_VERSION: u32 = 2;

/// Maximum number of unacknowledged states to keep
const MAX_PENDING_STATES: usize = 32;

/// Maximum number of received states to keep
const MAX_RECEIVED_STATES: usize = 1024;

/// One packet of the synchronization protocol
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
pub struct TransportInstruction {
    pub protocol_version: u32,

    /// State the diff applies to
    pub old_num: u64,

    /// State the diff produces
    pub new_num: u64,

    /// Newest peer state the sender has received
    pub ack_num: u64,

    /// Receiver may forget states older than this
    pub throwaway_num: u64,

    /// Compressed diff
    pub diff: Vec<u8>,
}

impl TransportInstruction {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        FramedCodec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        let instruction: Self = FramedCodec::decode(bytes)?;
        if instruction.protocol_version != PROTOCOL_VERSION {
            return Err(StateError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: instruction.protocol_version,
            });
        }
        Ok(instruction)
    }

    /// Whether the packet only carries an acknowledgment
    pub fn is_ack_only(&self) -> bool {
        self.old_num == self.new_num && self.diff.is_empty()
    }
}

#[derive(Debug, Clone)]
struct NumberedState<S> {
    num: u64,
    state: S,
}

/// Sending half: the local state and what the peer has acknowledged
pub struct TransportSender<S: SyncState> {
    /// State the application is editing
    current_state: S,

    /// Sent states, oldest first; the front is acknowledged by the peer
    sent_states: VecDeque<NumberedState<S>>,

    compressor: Compressor,
}

impl<S: SyncState> TransportSender<S> {
    pub fn new(initial_state: S, compressor: Compressor) -> Self {
        let mut sent_states = VecDeque::new();
        sent_states.push_back(NumberedState {
            num: 0,
            state: initial_state.clone(),
        });

        Self {
            current_state: initial_state,
            sent_states,
            compressor,
        }
    }

    pub fn current_state(&self) -> &S {
        &self.current_state
    }

    pub fn current_state_mut(&mut self) -> &mut S {
        &mut self.current_state
    }

    fn acked(&self) -> &NumberedState<S> {
        // Never empty: starts with state 0 and pruning keeps the acked state
        &self.sent_states[0]
    }

    fn newest(&self) -> &NumberedState<S> {
        &self.sent_states[self.sent_states.len() - 1]
    }

    /// Number of the state the peer has acknowledged
    pub fn acked_num(&self) -> u64 {
        self.acked().num
    }

    /// Number of the newest state sent
    pub fn sent_num(&self) -> u64 {
        self.newest().num
    }

    /// Nothing left to send and everything sent is acknowledged
    pub fn is_idle(&self) -> bool {
        self.sent_states.len() == 1 && self.current_state == self.acked().state
    }

    /// Next packet carrying state, if any
    ///
    /// A changed current state becomes a new numbered state. Otherwise the
    /// newest unacknowledged state is retransmitted. Diffs are always taken
    /// against the acknowledged state so that any single packet is enough
    /// for the peer to catch up.
    pub fn next_instruction(
        &mut self,
        ack_num: u64,
    ) -> Result<Option<TransportInstruction>, StateError> {
        if self.current_state != self.newest().state {
            let new_num = self.sent_num() + 1;
            if self.sent_states.len() >= MAX_PENDING_STATES {
                // Keep the acked state; intermediate states are only
                // needed to recognise their acks
                self.sent_states.remove(1);
            }
            self.sent_states.push_back(NumberedState {
                num: new_num,
                state: self.current_state.clone(),
            });
            debug!("New local state {}", new_num);
        } else if self.sent_states.len() == 1 {
            return Ok(None);
        }

        let newest = self.newest();
        let acked = self.acked();
        let diff = newest.state.diff_from(&acked.state)?;

        Ok(Some(TransportInstruction {
            protocol_version: PROTOCOL_VERSION,
            old_num: acked.num,
            new_num: newest.num,
            ack_num,
            throwaway_num: acked.num,
            diff: self.compressor.compress(&diff)?,
        }))
    }

    /// Packet carrying only an acknowledgment
    pub fn ack_instruction(&self, ack_num: u64) -> TransportInstruction {
        let num = self.sent_num();
        TransportInstruction {
            protocol_version: PROTOCOL_VERSION,
            old_num: num,
            new_num: num,
            ack_num,
            throwaway_num: self.acked_num(),
            diff: Vec::new(),
        }
    }

    /// Process acknowledgment from peer
    pub fn process_ack(&mut self, ack_num: u64) {
        if ack_num <= self.acked_num() {
            return;
        }
        if !self.sent_states.iter().any(|s| s.num == ack_num) {
            trace!("Ignoring ack of unknown state {}", ack_num);
            return;
        }

        while self.acked_num() < ack_num {
            self.sent_states.pop_front();
        }
        debug!("Peer acknowledged state {}", ack_num);

        self.rationalize();
    }

    /// Express every state relative to the acknowledged one
    fn rationalize(&mut self) {
        let known = self.acked().state.clone();
        self.current_state.subtract(&known);
        for sent in self.sent_states.iter_mut().rev() {
            sent.state.subtract(&known);
        }
    }
}

/// Receiving half: states built from the peer's diffs
pub struct TransportReceiver<S: SyncState> {
    /// Received states in number order
    states: VecDeque<NumberedState<S>>,

    /// State as of the last [`TransportReceiver::remote_diff`]
    last_read: S,

    compressor: Compressor,
}

impl<S: SyncState> TransportReceiver<S> {
    pub fn new(initial_state: S, compressor: Compressor) -> Self {
        let mut states = VecDeque::new();
        states.push_back(NumberedState {
            num: 0,
            state: initial_state.clone(),
        });

        Self {
            states,
            last_read: initial_state,
            compressor,
        }
    }

    fn newest(&self) -> &NumberedState<S> {
        &self.states[self.states.len() - 1]
    }

    /// Number of the newest state received
    pub fn ack_num(&self) -> u64 {
        self.newest().num
    }

    pub fn latest(&self) -> &S {
        &self.newest().state
    }

    /// Apply one packet's diff; returns whether a new state was stored
    pub fn recv(&mut self, instruction: &TransportInstruction) -> Result<bool, StateError> {
        if instruction.new_num <= instruction.old_num {
            return Ok(false);
        }
        if self.states.iter().any(|s| s.num == instruction.new_num) {
            trace!("Ignoring duplicate state {}", instruction.new_num);
            return Ok(false);
        }

        let Some(baseline) = self.states.iter().find(|s| s.num == instruction.old_num) else {
            debug!(
                "Ignoring state {} based on unknown state {}",
                instruction.new_num, instruction.old_num
            );
            return Ok(false);
        };

        let diff = self.compressor.decompress(&instruction.diff)?;
        let mut state = baseline.state.clone();
        state.apply_string(&diff)?;

        let position = self
            .states
            .iter()
            .position(|s| s.num > instruction.new_num)
            .unwrap_or(self.states.len());
        self.states.insert(
            position,
            NumberedState {
                num: instruction.new_num,
                state,
            },
        );

        let throwaway_num = instruction.throwaway_num.min(instruction.new_num);
        self.states.retain(|s| s.num >= throwaway_num);
        while self.states.len() > MAX_RECEIVED_STATES {
            self.states.pop_front();
        }

        debug!("Received remote state {}", instruction.new_num);
        Ok(true)
    }

    /// Diff of the newest state against the state last read
    pub fn remote_diff(&mut self) -> Result<Vec<u8>, StateError> {
        let diff = self.latest().diff_from(&self.last_read)?;

        let oldest = self.states[0].state.clone();
        for received in self.states.iter_mut().rev() {
            received.state.subtract(&oldest);
        }
        self.last_read = self.latest().clone();

        Ok(diff)
    }
}

/// One end of a session: sends `L`, receives `R`
pub struct Transport<L: SyncState, R: SyncState> {
    sender: TransportSender<L>,
    receiver: TransportReceiver<R>,

    /// A data packet arrived since our last send
    ack_pending: bool,
}

impl<L: SyncState, R: SyncState> Transport<L, R> {
    pub fn new(local: L, remote: R, compression: CompressionAlgorithm) -> Self {
        let compressor = Compressor::new(compression);
        Self {
            sender: TransportSender::new(local, compressor),
            receiver: TransportReceiver::new(remote, compressor),
            ack_pending: false,
        }
    }

    pub fn current_state(&self) -> &L {
        self.sender.current_state()
    }

    pub fn current_state_mut(&mut self) -> &mut L {
        self.sender.current_state_mut()
    }

    pub fn latest_remote_state(&self) -> &R {
        self.receiver.latest()
    }

    pub fn remote_state_num(&self) -> u64 {
        self.receiver.ack_num()
    }

    pub fn remote_diff(&mut self) -> Result<Vec<u8>, StateError> {
        self.receiver.remote_diff()
    }

    pub fn sender(&self) -> &TransportSender<L> {
        &self.sender
    }

    /// Produce the next outbound packet, if anything needs sending
    pub fn tick(&mut self) -> Result<Option<Vec<u8>>, StateError> {
        let ack_num = self.receiver.ack_num();
        let instruction = match self.sender.next_instruction(ack_num)? {
            Some(instruction) => instruction,
            None if self.ack_pending => self.sender.ack_instruction(ack_num),
            None => return Ok(None),
        };

        self.ack_pending = false;
        trace!(
            "Sending {} -> {} (ack {})",
            instruction.old_num,
            instruction.new_num,
            instruction.ack_num
        );
        instruction.encode().map(Some)
    }

    /// Process an inbound packet; returns whether a new remote state arrived
    pub fn recv(&mut self, packet: &[u8]) -> Result<bool, StateError> {
        let instruction = match TransportInstruction::decode(packet) {
            Ok(instruction) => instruction,
            Err(e) => {
                warn!("Dropping undecodable packet: {}", e);
                return Err(e);
            }
        };

        self.sender.process_ack(instruction.ack_num);
        if !instruction.is_ack_only() {
            self.ack_pending = true;
        }
        self.receiver.recv(&instruction)
    }
}
