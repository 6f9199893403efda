//! Single-process loopback session
//!
//! Runs the server and client ends of a session against each other over an
//! in-memory link. Packets are cut into fragments no larger than the MTU,
//! fragments spend one step in flight, and each direction can be told to
//! lose every Nth fragment.

use crate::prediction::EchoPredictions;
use anyhow::{bail, Result};
use resh_state::{
    CompressionAlgorithm, Complete, Fragment, FragmentAssembly, Fragmenter, SyncState, Transport,
    UserStream, FRAGMENT_HEADER_LEN,
};
use resh_terminal::Emulator;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Largest datagram the link carries unless told otherwise
pub const DEFAULT_MTU: usize = 500;

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub width: u16,
    pub height: u16,
    pub compression: CompressionAlgorithm,
    /// Lose every Nth fragment in each direction; 0 never loses any
    pub drop_every: usize,
    /// Largest fragment put on the link, header included
    pub mtu: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 24,
            compression: CompressionAlgorithm::default(),
            drop_every: 0,
            mtu: DEFAULT_MTU,
        }
    }
}

/// One direction of the in-memory link
#[derive(Debug, Default)]
struct LossyLink {
    drop_every: usize,
    mtu: usize,
    sent: u64,
    dropped: u64,
    in_flight: VecDeque<Vec<u8>>,
    fragmenter: Fragmenter,
    assembly: FragmentAssembly,
}

impl LossyLink {
    fn new(drop_every: usize, mtu: usize) -> Self {
        Self {
            drop_every,
            mtu,
            ..Default::default()
        }
    }

    /// Put one datagram on the link, unless it is the one to lose
    fn send(&mut self, datagram: Vec<u8>) {
        self.sent += 1;
        if self.drop_every > 0 && self.sent % self.drop_every as u64 == 0 {
            self.dropped += 1;
            trace!("Dropping datagram {} ({} bytes)", self.sent, datagram.len());
            return;
        }
        self.in_flight.push_back(datagram);
    }

    fn deliver(&mut self) -> Vec<Vec<u8>> {
        self.in_flight.drain(..).collect()
    }

    /// Fragment a transport packet and send the pieces
    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        for fragment in self.fragmenter.make_fragments(packet, self.mtu)? {
            self.send(fragment.encode());
        }
        Ok(())
    }

    /// Deliver what is in flight, returning the packets it completes
    fn deliver_packets(&mut self) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        for datagram in self.deliver() {
            match Fragment::decode(&datagram) {
                Ok(fragment) => packets.extend(self.assembly.add_fragment(fragment)),
                Err(e) => debug!("Discarding datagram: {}", e),
            }
        }
        packets
    }
}

/// Link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
}

/// Server and client joined by a lossy link
pub struct LoopbackSession {
    server: Transport<Complete, UserStream>,
    client: Transport<UserStream, Complete>,
    to_server: LossyLink,
    to_client: LossyLink,
    predictions: EchoPredictions,
}

impl LoopbackSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            bail!(
                "terminal size must be positive, got {}x{}",
                config.width,
                config.height
            );
        }
        if config.drop_every == 1 {
            bail!("--drop-every 1 would lose every packet");
        }
        if config.mtu <= FRAGMENT_HEADER_LEN {
            bail!(
                "mtu must exceed the {} byte fragment header, got {}",
                FRAGMENT_HEADER_LEN,
                config.mtu
            );
        }

        let terminal = Complete::new(config.width, config.height);
        debug!(
            "Starting loopback session {}x{} with {:?} compression",
            config.width, config.height, config.compression
        );

        Ok(Self {
            server: Transport::new(terminal.clone(), UserStream::new(), config.compression),
            client: Transport::new(UserStream::new(), terminal, config.compression),
            to_server: LossyLink::new(config.drop_every, config.mtu),
            to_client: LossyLink::new(config.drop_every, config.mtu),
            predictions: EchoPredictions::new(),
        })
    }

    /// Feed output of the host program to the server's terminal
    ///
    /// Returns the terminal's replies, which belong to the host.
    pub fn host_output(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.server.current_state_mut().act(bytes)
    }

    /// Type text on the client
    ///
    /// The keys travel in the next state the client sends, so that is the
    /// frame their echo is predicted for.
    pub fn type_keys(&mut self, text: &str) {
        let frame = self.client.sender().sent_num() + 1;
        self.predictions.predict(frame, text);
        self.client.current_state_mut().push_str(text);
    }

    /// Resize the client's window
    pub fn resize(&mut self, width: u16, height: u16) {
        self.client
            .current_state_mut()
            .push_back_resize(width, height);
    }

    /// Advance the session to `now` milliseconds
    ///
    /// Delivers the packets sent during the previous step, replays new user
    /// input on the server, then lets both ends send. Returns the bytes the
    /// server's terminal produced for the host. A packet that fails to
    /// decode is discarded on its own.
    pub fn step(&mut self, now: u64) -> Result<Vec<u8>> {
        let mut new_input = false;
        for packet in self.to_server.deliver_packets() {
            match self.server.recv(&packet) {
                Ok(new_state) => new_input |= new_state,
                Err(e) => debug!("Server discarded packet: {}", e),
            }
        }
        for packet in self.to_client.deliver_packets() {
            if let Err(e) = self.client.recv(&packet) {
                debug!("Client discarded packet: {}", e);
            }
        }
        self.predictions.cull(self.client_echo_ack());

        let mut to_host = Vec::new();
        if new_input {
            to_host = self.replay_user_input(now)?;
        }
        if self.server.current_state_mut().set_echo_ack(now) {
            trace!("Echo ack now {}", self.server.current_state().echo_ack());
        }

        if let Some(packet) = self.client.tick()? {
            self.to_server.send_packet(&packet)?;
        }
        if let Some(packet) = self.server.tick()? {
            self.to_client.send_packet(&packet)?;
        }

        Ok(to_host)
    }

    fn replay_user_input(&mut self, now: u64) -> Result<Vec<u8>> {
        let diff = self.server.remote_diff()?;
        let mut input = UserStream::new();
        input.apply_string(&diff)?;

        let mut to_host = Vec::new();
        let terminal = self.server.current_state_mut();
        for event in input.events() {
            to_host.extend(terminal.act_one(&event.to_action()));
        }

        let frame_num = self.server.remote_state_num();
        self.server
            .current_state_mut()
            .register_input_frame(frame_num, now);
        debug!("Replayed {} user events up to frame {}", input.size(), frame_num);

        Ok(to_host)
    }

    /// Both ends hold the same states and nothing is in flight
    pub fn is_synchronized(&self) -> bool {
        self.to_server.in_flight.is_empty()
            && self.to_client.in_flight.is_empty()
            && self.client.sender().is_idle()
            && self.server.sender().is_idle()
            && self.client.latest_remote_state() == self.server.current_state()
    }

    /// The screen as the client sees it
    pub fn client_screen(&self) -> &Emulator {
        self.client.latest_remote_state().terminal()
    }

    /// The screen as the server holds it
    pub fn server_screen(&self) -> &Emulator {
        self.server.current_state().terminal()
    }

    /// Newest user frame the client knows is reflected in its screen
    pub fn client_echo_ack(&self) -> u64 {
        self.client.latest_remote_state().echo_ack()
    }

    /// Typed text whose echo the host has not confirmed yet
    pub fn predicted_echo(&self) -> String {
        self.predictions.pending_text()
    }

    /// Client frames still waiting for their echo ack
    pub fn pending_predictions(&self) -> usize {
        self.predictions.len()
    }

    /// Milliseconds until the server's echo ack may next advance
    pub fn echo_wait_time(&self, now: u64) -> u64 {
        self.server.current_state().wait_time(now)
    }

    pub fn upstream_stats(&self) -> LinkStats {
        LinkStats {
            sent: self.to_server.sent,
            dropped: self.to_server.dropped,
        }
    }

    pub fn downstream_stats(&self) -> LinkStats {
        LinkStats {
            sent: self.to_client.sent,
            dropped: self.to_client.dropped,
        }
    }
}
