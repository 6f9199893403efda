//! State synchronization for Resh
//!
//! Two independent state types, the server's terminal ([`Complete`]) and the
//! client's input log ([`UserStream`]), are kept in step over a lossy channel
//! by exchanging diffs against a state the peer has acknowledged.

pub mod complete;
pub mod compress;
pub mod fragment;
pub mod sync;
pub mod user;
pub mod wire;

pub use complete::{Complete, ECHO_TIMEOUT};
pub use compress::{CompressionAlgorithm, Compressor};
pub use fragment::{Fragment, FragmentAssembly, Fragmenter, FRAGMENT_HEADER_LEN};
pub use sync::{Transport, TransportInstruction, TransportReceiver, TransportSender};
pub use user::{UserEvent, UserStream};
pub use wire::{HostInstruction, HostMessage, UserInstruction, UserMessage};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Protocol version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// A state that can be synchronized by exchanging diffs
///
/// Equality is the observable state; clones are snapshots a diff can be
/// computed against later. An empty diff is the empty byte string.
pub trait SyncState: Clone + PartialEq {
    /// Forget the part of this state that the peer already holds as `prefix`
    fn subtract(&mut self, prefix: &Self);

    /// Encode what turns `existing` into `self`
    fn diff_from(&self, existing: &Self) -> Result<Vec<u8>, StateError>;

    /// Encode `self` relative to a freshly created state
    fn init_diff(&self) -> Result<Vec<u8>, StateError>;

    /// Apply a diff produced by [`SyncState::diff_from`]
    ///
    /// The diff is decoded completely before anything is applied, so a
    /// malformed diff leaves the state untouched.
    fn apply_string(&mut self, diff: &[u8]) -> Result<(), StateError>;

    /// Drop partially decoded input
    fn reset_input(&mut self);
}
