//! Control frames exchanged by the rendezvous barrier.
//!
//! Every frame is 8 bytes: a little-endian `u32` kind followed by a
//! little-endian `u32` value.

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::TransportError;

/// Size of an encoded [`Message`].
pub const FRAME_LEN: usize = 8;

const KIND_ARRIVAL: u32 = 1;
const KIND_RELEASE: u32 = 2;
const KIND_JOIN: u32 = 3;

#[derive(FromZeroes, FromBytes, AsBytes, Clone, Copy)]
#[repr(C)]
struct Frame {
    kind: U32<LittleEndian>,
    value: U32<LittleEndian>,
}

/// A rendezvous control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// A rank reached the barrier for `epoch`.
    Arrival {
        /// Barrier epoch the sender is in.
        epoch: u32,
    },
    /// Rank 0 lets everyone through `epoch`.
    Release {
        /// Barrier epoch being released.
        epoch: u32,
    },
    /// First frame on a fresh connection, naming the connecting rank.
    Join {
        /// Rank of the connecting process.
        rank: u32,
    },
}

impl Message {
    /// Encodes into a fixed-size frame.
    pub fn encode(self) -> [u8; FRAME_LEN] {
        let (kind, value) = match self {
            Message::Arrival { epoch } => (KIND_ARRIVAL, epoch),
            Message::Release { epoch } => (KIND_RELEASE, epoch),
            Message::Join { rank } => (KIND_JOIN, rank),
        };
        let frame = Frame {
            kind: U32::new(kind),
            value: U32::new(value),
        };
        let mut out = [0u8; FRAME_LEN];
        out.copy_from_slice(frame.as_bytes());
        out
    }

    /// Decodes a frame.
    ///
    /// # Errors
    /// [`TransportError::Malformed`] for an unknown kind.
    pub fn decode(bytes: [u8; FRAME_LEN]) -> Result<Self, TransportError> {
        let frame = Frame::read_from(&bytes[..]).ok_or(TransportError::Malformed { bytes })?;
        let value = frame.value.get();
        match frame.kind.get() {
            KIND_ARRIVAL => Ok(Message::Arrival { epoch: value }),
            KIND_RELEASE => Ok(Message::Release { epoch: value }),
            KIND_JOIN => Ok(Message::Join { rank: value }),
            _ => Err(TransportError::Malformed { bytes }),
        }
    }
}
