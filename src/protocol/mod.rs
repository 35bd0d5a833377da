pub mod handshake;
pub mod reading;
pub mod reassembly;

use std::fmt::{Debug, Display, Formatter};

/// Every session starts with this byte sequence, followed by the device id and padding. There is
///  no version field: a collector either understands the preamble or drops the connection.
pub const HANDSHAKE_PREAMBLE: &[u8] = b"HS";

pub const HANDSHAKE_PADDING_LEN: usize = 10;

/// preamble + device id (u32) + padding
pub const HANDSHAKE_LEN: usize = HANDSHAKE_PREAMBLE.len() + size_of::<u32>() + HANDSHAKE_PADDING_LEN;

pub const NUM_CHANNELS: usize = 10;

/// device tag + counter + channels, each an i16
pub const RECORD_SIZE: usize = (2 + NUM_CHANNELS) * size_of::<i16>();


/// Identifies a simulated telemetry source for the lifetime of a run. Ids are handed out
///  sequentially by the client side, starting at 0.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DeviceId(pub u32);

impl Debug for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "D{}", self.0)
    }
}
impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("handshake preamble mismatch: expected {expected:?}, found {found:?}")]
    BadPreamble {
        expected: &'static [u8],
        found: Vec<u8>,
    },
}
