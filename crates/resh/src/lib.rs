//! Resh: a loopback session over the state synchronization core

pub mod loopback;
pub mod prediction;
pub mod session;

pub use prediction::EchoPredictions;
pub use session::{LinkStats, LoopbackSession, SessionConfig, DEFAULT_MTU};
