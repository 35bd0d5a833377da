use std::marker::PhantomData;

use crate::protocol::reading::Reading;
use crate::protocol::{DeviceId, NUM_CHANNELS};
use crate::util::random::{Random, RngRandom};


/// initial channel values are drawn from this range
pub const INITIAL_CHANNEL_RANGE: std::ops::Range<i16> = 0..1000;
/// each channel drifts by a value from this range from one reading to the next
pub const CHANNEL_DRIFT_RANGE: std::ops::Range<i16> = -10..10;

/// Synthetic readings for a simulated device: a random walk per channel, with a counter that
///  increments by one per reading. All arithmetic wraps at 16 bits.
///
/// The walk is random, so every generator yields a different sample.
pub struct ReadingGenerator<R: Random = RngRandom> {
    device_tag: i16,
    remaining: usize,
    previous: Option<Reading>,
    _random: PhantomData<R>,
}

impl ReadingGenerator<RngRandom> {
    pub fn new(device_id: DeviceId, num_readings: usize) -> ReadingGenerator<RngRandom> {
        Self::new_with_random(device_id, num_readings)
    }
}

impl<R: Random> ReadingGenerator<R> {
    pub fn new_with_random(device_id: DeviceId, num_readings: usize) -> ReadingGenerator<R> {
        ReadingGenerator {
            // the tag is a 16 bit value on the wire, larger ids wrap
            device_tag: device_id.0 as i16,
            remaining: num_readings,
            previous: None,
            _random: Default::default(),
        }
    }

    fn first(&self) -> Reading {
        let mut channels = [0i16; NUM_CHANNELS];
        for channel in channels.iter_mut() {
            *channel = R::gen_i16_range(INITIAL_CHANNEL_RANGE);
        }
        Reading {
            device_tag: self.device_tag,
            counter: 0,
            channels,
        }
    }

    fn successor(previous: &Reading) -> Reading {
        let mut channels = previous.channels;
        for channel in channels.iter_mut() {
            *channel = channel.wrapping_add(R::gen_i16_range(CHANNEL_DRIFT_RANGE));
        }
        Reading {
            device_tag: previous.device_tag,
            counter: previous.counter.wrapping_add(1),
            channels,
        }
    }
}

impl<R: Random> Iterator for ReadingGenerator<R> {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let next = match &self.previous {
            None => self.first(),
            Some(previous) => Self::successor(previous),
        };
        self.previous = Some(next);
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<R: Random> ExactSizeIterator for ReadingGenerator<R> {}
