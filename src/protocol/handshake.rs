use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::protocol::{DeviceId, ProtocolError, HANDSHAKE_LEN, HANDSHAKE_PADDING_LEN, HANDSHAKE_PREAMBLE};


/// Serializes the handshake frame that opens every session: preamble, device id and zero padding.
pub fn encode_handshake(device_id: DeviceId) -> Bytes {
    let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
    put_handshake(device_id, &mut buf);
    buf.freeze()
}

pub fn put_handshake(device_id: DeviceId, buf: &mut impl BufMut) {
    buf.put_slice(HANDSHAKE_PREAMBLE);
    buf.put_u32_le(device_id.0);
    buf.put_bytes(0, HANDSHAKE_PADDING_LEN);
}

/// Tries to read a handshake frame from the start of `buf`.
///
/// Returns `Ok(None)` if not enough bytes have arrived yet. The preamble is checked as soon as
///  preamble and device id are available, so a misbehaving peer is detected before the padding
///  arrives. On success, the returned slice holds everything after the padding.
pub fn decode_handshake(buf: &[u8]) -> Result<Option<(DeviceId, &[u8])>, ProtocolError> {
    if buf.len() < HANDSHAKE_PREAMBLE.len() + size_of::<u32>() {
        trace!(available = buf.len(), "incomplete handshake");
        return Ok(None);
    }

    if !buf.starts_with(HANDSHAKE_PREAMBLE) {
        return Err(ProtocolError::BadPreamble {
            expected: HANDSHAKE_PREAMBLE,
            found: buf[..HANDSHAKE_PREAMBLE.len()].to_vec(),
        });
    }

    if buf.len() < HANDSHAKE_LEN {
        trace!(available = buf.len(), "handshake padding not complete yet");
        return Ok(None);
    }

    let mut rest = &buf[HANDSHAKE_PREAMBLE.len()..];
    let device_id = DeviceId(rest.get_u32_le());
    rest.advance(HANDSHAKE_PADDING_LEN);
    Ok(Some((device_id, rest)))
}
