use rand::Rng;
use std::ops::Range;
#[cfg(test)] use std::sync::Mutex;



#[cfg(test)]
/// automock expectations for static methods are global - hold this lock to avoid races
pub static MOCK_RANDOM_MUTEX: Mutex<()> = Mutex::new(());

#[cfg_attr(test, mockall::automock)]
pub trait Random {
    fn gen_i16_range(range: Range<i16>) -> i16;
}
pub struct RngRandom {}
impl Random for RngRandom {
    fn gen_i16_range(range: Range<i16>) -> i16 {
        rand::thread_rng().gen_range(range)
    }
}
