use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::protocol::handshake::decode_handshake;
use crate::protocol::reading::{decode_records, Reading};
use crate::protocol::{DeviceId, ProtocolError, RECORD_SIZE};


/// Collects bytes as they arrive from a connection and hands out whole frames only. Bytes that do
///  not (yet) form a complete frame are retained for the next call.
///
/// Arrival granularity is irrelevant: appending one byte at a time yields exactly the same frames
///  as appending everything at once.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    buf: BytesMut,
}

impl ReassemblyBuffer {
    pub fn new() -> ReassemblyBuffer {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> ReassemblyBuffer {
        ReassemblyBuffer {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Consumes the handshake frame from the front of the buffer if it is complete.
    pub fn take_handshake(&mut self) -> Result<Option<DeviceId>, ProtocolError> {
        let (device_id, consumed) = match decode_handshake(&self.buf)? {
            None => return Ok(None),
            Some((device_id, rest)) => (device_id, self.buf.len() - rest.len()),
        };
        self.buf.advance(consumed);
        Ok(Some(device_id))
    }

    /// Decodes all complete records, leaving only the incomplete tail in the buffer.
    pub fn drain_records(&mut self) -> Vec<Reading> {
        let (records, tail_len) = {
            let (records, tail) = decode_records(&self.buf);
            (records, tail.len())
        };
        self.buf.advance(self.buf.len() - tail_len);

        debug_assert!(self.buf.len() < RECORD_SIZE);
        trace!(num_records = records.len(), retained = self.buf.len(), "drained records");
        records
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// drops all retained bytes and the underlying allocation
    pub fn clear(&mut self) {
        self.buf = BytesMut::new();
    }
}
