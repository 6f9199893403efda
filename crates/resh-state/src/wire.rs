//! Wire formats for state diffs
//!
//! Every diff travels as a length-prefixed rkyv archive. An empty
//! instruction list is sent as the empty byte string.

use crate::StateError;
use bytes::{Buf, BufMut, BytesMut};
use resh_terminal::Resize;
use rkyv::{
    ser::serializers::AllocSerializer, validation::validators::DefaultValidator, AlignedVec,
    Archive, CheckBytes, Deserialize, Serialize,
};

/// One instruction from server to client
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
pub enum HostInstruction {
    /// Newest user frame known to be reflected in the screen
    EchoAck { ack_num: u64 },

    /// New terminal geometry
    Resize { width: i32, height: i32 },

    /// Escape sequences that update the client's screen
    HostBytes { bytes: Vec<u8> },
}

/// Server to client diff
#[derive(Debug, Clone, PartialEq, Eq, Default, Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
pub struct HostMessage {
    pub instructions: Vec<HostInstruction>,
}

/// One instruction from client to server
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
pub enum UserInstruction {
    /// UTF-8 encoded keystrokes
    Keystroke { keys: Vec<u8> },

    /// New window geometry
    Resize { width: i32, height: i32 },
}

/// Client to server diff
#[derive(Debug, Clone, PartialEq, Eq, Default, Archive, Deserialize, Serialize)]
#[archive(check_bytes)]
pub struct UserMessage {
    pub instructions: Vec<UserInstruction>,
}

/// Length-prefixed archive codec
pub struct FramedCodec;

impl FramedCodec {
    /// Encode a value with a 4-byte big-endian length prefix
    pub fn encode<T>(value: &T) -> Result<Vec<u8>, StateError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        let payload = rkyv::to_bytes::<_, 256>(value)
            .map_err(|e| StateError::SerializationError(e.to_string()))?;

        let length = u32::try_from(payload.len())
            .map_err(|_| StateError::SerializationError("Message too large".to_string()))?;

        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(length);
        buf.extend_from_slice(&payload);
        Ok(buf.to_vec())
    }

    /// Decode exactly one framed value; trailing or missing bytes are errors
    pub fn decode<T>(bytes: &[u8]) -> Result<T, StateError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, rkyv::Infallible>,
    {
        let mut buf = bytes;
        if buf.remaining() < 4 {
            return Err(StateError::MalformedMessage(
                "truncated length prefix".to_string(),
            ));
        }

        let length = buf.get_u32() as usize;
        if length == 0 || buf.remaining() != length {
            return Err(StateError::MalformedMessage(format!(
                "length prefix {} does not match payload of {} bytes",
                length,
                buf.remaining()
            )));
        }

        // Archives must be read from an aligned buffer
        let mut aligned = AlignedVec::with_capacity(length);
        aligned.extend_from_slice(buf);

        let archived = rkyv::check_archived_root::<T>(&aligned)
            .map_err(|_| StateError::MalformedMessage("archive validation failed".to_string()))?;

        archived
            .deserialize(&mut rkyv::Infallible)
            .map_err(|_| StateError::MalformedMessage("archive deserialization failed".to_string()))
    }
}

/// Largest screen a peer may ask for, in cells
pub const MAX_TERMINAL_CELLS: u32 = 1 << 20;

/// Validate wire dimensions
pub fn checked_resize(width: i32, height: i32) -> Result<Resize, StateError> {
    let dimension = |value: i32| u16::try_from(value).ok().filter(|v| *v > 0);
    match (dimension(width), dimension(height)) {
        (Some(w), Some(h)) if u32::from(w) * u32::from(h) <= MAX_TERMINAL_CELLS => {
            Ok(Resize::new(w, h))
        }
        _ => Err(StateError::MalformedMessage(format!(
            "invalid terminal size {width}x{height}"
        ))),
    }
}

impl HostMessage {
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        FramedCodec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        let message: Self = FramedCodec::decode(bytes)?;
        for instruction in &message.instructions {
            if let HostInstruction::Resize { width, height } = instruction {
                checked_resize(*width, *height)?;
            }
        }
        Ok(message)
    }
}

impl UserMessage {
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        FramedCodec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        let message: Self = FramedCodec::decode(bytes)?;
        for instruction in &message.instructions {
            if let UserInstruction::Resize { width, height } = instruction {
                checked_resize(*width, *height)?;
            }
        }
        Ok(message)
    }
}
