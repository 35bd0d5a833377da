use bytes::BytesMut;

use crate::protocol::handshake::put_handshake;
use crate::protocol::reading::{encode_record, Reading};
use crate::protocol::{DeviceId, NUM_CHANNELS};


/// convenience for test code: a reading whose channels are derived from device tag and counter,
///  so that different arguments give different readings
pub fn test_reading(device_tag: i16, counter: i16) -> Reading {
    let mut channels = [0i16; NUM_CHANNELS];
    for (i, channel) in channels.iter_mut().enumerate() {
        *channel = device_tag
            .wrapping_mul(100)
            .wrapping_add(counter.wrapping_mul(10))
            .wrapping_add(i as i16);
    }
    Reading {
        device_tag,
        counter,
        channels,
    }
}

pub fn encode_all(readings: &[Reading]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for reading in readings {
        encode_record(reading, &mut buf);
    }
    buf.to_vec()
}

/// the complete byte stream of a well-behaved session: handshake followed by all readings
pub fn session_bytes(device_id: DeviceId, readings: &[Reading]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_handshake(device_id, &mut buf);
    for reading in readings {
        encode_record(reading, &mut buf);
    }
    buf.to_vec()
}
