//! Splitting packets to fit a datagram size
//!
//! Each fragment carries the id of the packet it belongs to, its position
//! and whether it is the last one. A packet that is sent again unchanged
//! keeps its id, so fragments from different transmissions can complete
//! each other.

use crate::StateError;
use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

/// Bytes of fragment header: id, then position with the final flag on top
pub const FRAGMENT_HEADER_LEN: usize = 10;

const FINAL_FLAG: u16 = 0x8000;
const MAX_FRAGMENTS: usize = 0x8000;

/// One piece of a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: u64,
    pub fragment_num: u16,
    pub is_final: bool,
    pub contents: Vec<u8>,
}

impl Fragment {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(FRAGMENT_HEADER_LEN + self.contents.len());
        buf.put_u64(self.id);
        let flag = if self.is_final { FINAL_FLAG } else { 0 };
        buf.put_u16(self.fragment_num | flag);
        buf.extend_from_slice(&self.contents);
        buf.to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        let mut buf = bytes;
        if buf.remaining() < FRAGMENT_HEADER_LEN {
            return Err(StateError::MalformedMessage(format!(
                "fragment of {} bytes is shorter than its header",
                bytes.len()
            )));
        }

        let id = buf.get_u64();
        let combo = buf.get_u16();
        Ok(Self {
            id,
            fragment_num: combo & !FINAL_FLAG,
            is_final: combo & FINAL_FLAG != 0,
            contents: buf.to_vec(),
        })
    }
}

/// Cuts outgoing packets into fragments
#[derive(Debug, Default)]
pub struct Fragmenter {
    next_id: u64,
    last: Option<(Vec<u8>, usize)>,
}

impl Fragmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `packet` into fragments of at most `mtu` bytes each
    pub fn make_fragments(&mut self, packet: &[u8], mtu: usize) -> Result<Vec<Fragment>, StateError> {
        let room = mtu.saturating_sub(FRAGMENT_HEADER_LEN);
        if room == 0 {
            return Err(StateError::SerializationError(format!(
                "mtu {mtu} leaves no room after the fragment header"
            )));
        }
        let count = packet.len().div_ceil(room).max(1);
        if count > MAX_FRAGMENTS {
            return Err(StateError::SerializationError(format!(
                "packet of {} bytes needs {count} fragments",
                packet.len()
            )));
        }

        let repeated = matches!(&self.last, Some((last, last_mtu)) if last == packet && *last_mtu == mtu);
        if !repeated {
            self.next_id += 1;
            self.last = Some((packet.to_vec(), mtu));
        }

        let mut fragments: Vec<Fragment> = packet
            .chunks(room)
            .enumerate()
            .map(|(i, chunk)| Fragment {
                id: self.next_id,
                fragment_num: i as u16,
                is_final: false,
                contents: chunk.to_vec(),
            })
            .collect();
        if fragments.is_empty() {
            fragments.push(Fragment {
                id: self.next_id,
                fragment_num: 0,
                is_final: false,
                contents: Vec::new(),
            });
        }
        if let Some(last) = fragments.last_mut() {
            last.is_final = true;
        }

        Ok(fragments)
    }
}

/// Reassembles the fragments of the newest packet id seen
#[derive(Debug, Default)]
pub struct FragmentAssembly {
    current_id: Option<u64>,
    fragments: Vec<Option<Vec<u8>>>,
    arrived: usize,
    total: Option<usize>,
}

impl FragmentAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fragment; returns the packet once every piece is present
    pub fn add_fragment(&mut self, fragment: Fragment) -> Option<Vec<u8>> {
        if self.current_id != Some(fragment.id) {
            if self.current_id.is_some() && self.arrived > 0 {
                trace!("Abandoning incomplete packet {:?}", self.current_id);
            }
            self.current_id = Some(fragment.id);
            self.fragments.clear();
            self.arrived = 0;
            self.total = None;
        }

        let index = usize::from(fragment.fragment_num);
        if fragment.is_final {
            self.total = Some(index + 1);
        }
        if self.fragments.len() <= index {
            self.fragments.resize(index + 1, None);
        }
        if self.fragments[index].is_none() {
            self.fragments[index] = Some(fragment.contents);
            self.arrived += 1;
        }

        let total = self.total?;
        if self.arrived < total || self.fragments[..total].iter().any(Option::is_none) {
            return None;
        }

        let packet = self.fragments[..total].iter().flatten().flatten().copied().collect();
        self.fragments.clear();
        self.arrived = 0;
        self.total = None;
        Some(packet)
    }
}
