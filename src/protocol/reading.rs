use bytes::{Buf, BufMut};

use crate::protocol::{NUM_CHANNELS, RECORD_SIZE};


/// A single biosignal sample as it travels on the wire: twelve little-endian i16 values.
///
/// Values are not range checked. Generators produce them with wrapping arithmetic, and they are
///  stored exactly as received.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Reading {
    pub device_tag: i16,
    pub counter: i16,
    pub channels: [i16; NUM_CHANNELS],
}

impl Reading {
    /// the row as it is handed to a sink, in column order
    pub fn fields(&self) -> [i16; 2 + NUM_CHANNELS] {
        let mut result = [0i16; 2 + NUM_CHANNELS];
        result[0] = self.device_tag;
        result[1] = self.counter;
        result[2..].copy_from_slice(&self.channels);
        result
    }
}

pub fn encode_record(record: &Reading, buf: &mut impl BufMut) {
    buf.put_i16_le(record.device_tag);
    buf.put_i16_le(record.counter);
    for channel in record.channels {
        buf.put_i16_le(channel);
    }
}

/// Reads one record from the start of `buf`, or `None` if fewer than [RECORD_SIZE] bytes remain.
///  Nothing is consumed in that case.
pub fn decode_record(buf: &mut impl Buf) -> Option<Reading> {
    if buf.remaining() < RECORD_SIZE {
        return None;
    }

    let device_tag = buf.get_i16_le();
    let counter = buf.get_i16_le();
    let mut channels = [0i16; NUM_CHANNELS];
    for channel in channels.iter_mut() {
        *channel = buf.get_i16_le();
    }

    Some(Reading {
        device_tag,
        counter,
        channels,
    })
}

/// Decodes as many whole records as `buf` holds, returning them together with the incomplete
///  tail. A partial trailing frame is the normal case for streamed input, not an error.
pub fn decode_records(buf: &[u8]) -> (Vec<Reading>, &[u8]) {
    let mut remaining = buf;
    let mut result = Vec::with_capacity(buf.len() / RECORD_SIZE);
    while let Some(record) = decode_record(&mut remaining) {
        result.push(record);
    }
    (result, remaining)
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use rstest::rstest;
    use crate::test_util::reading::{encode_all, test_reading};
    use super::*;

    #[test]
    fn test_encode_record_layout() {
        let reading = Reading {
            device_tag: 1,
            counter: -2,
            channels: [3, 4, 5, 6, 7, 8, 9, 10, 0x1234, i16::MIN],
        };
        let mut buf = BytesMut::new();
        encode_record(&reading, &mut buf);

        assert_eq!(buf.as_ref(), b"\x01\0\xfe\xff\x03\0\x04\0\x05\0\x06\0\x07\0\x08\0\x09\0\x0a\0\x34\x12\0\x80");
    }

    #[rstest]
    #[case::zero(Reading::default())]
    #[case::negative(Reading { device_tag: -1, counter: -300, channels: [-1, -2, -3, -4, -5, -6, -7, -8, -9, -10] })]
    #[case::boundaries(Reading { device_tag: i16::MAX, counter: i16::MIN, channels: [i16::MIN, i16::MAX, 0, -1, 1, i16::MIN, i16::MAX, 32767, -32768, 999] })]
    #[case::wrapped(Reading { device_tag: 0, counter: i16::MAX.wrapping_add(1), channels: [995i16.wrapping_add(i16::MAX); NUM_CHANNELS] })]
    fn test_record_round_trip(#[case] reading: Reading) {
        let mut buf = BytesMut::new();
        encode_record(&reading, &mut buf);
        assert_eq!(buf.len(), RECORD_SIZE);

        let mut encoded = buf.as_ref();
        assert_eq!(decode_record(&mut encoded), Some(reading));
        assert!(encoded.is_empty());
    }

    #[rstest]
    #[case::empty(0, 0)]
    #[case::one(1, 0)]
    #[case::one_with_tail(1, 5)]
    #[case::several(7, RECORD_SIZE - 1)]
    fn test_decode_records(#[case] num_records: usize, #[case] tail_len: usize) {
        let readings = (0..num_records)
            .map(|n| test_reading(3, n as i16))
            .collect::<Vec<_>>();
        let mut buf = encode_all(&readings);
        buf.extend_from_slice(&vec![0xab; tail_len]);

        let (decoded, tail) = decode_records(&buf);
        assert_eq!(decoded, readings);
        assert_eq!(tail, vec![0xab; tail_len].as_slice());
    }

    #[test]
    fn test_decode_record_short_consumes_nothing() {
        let buf = [1u8; RECORD_SIZE - 1];
        let mut remaining = buf.as_ref();
        assert_eq!(decode_record(&mut remaining), None);
        assert_eq!(remaining.len(), RECORD_SIZE - 1);
    }

    #[test]
    fn test_fields_order() {
        let reading = test_reading(9, 4);
        let fields = reading.fields();
        assert_eq!(fields[0], 9);
        assert_eq!(fields[1], 4);
        assert_eq!(&fields[2..], &reading.channels);
    }
}
