//! Helpers for testing code built on top of the session layer. They are part of the regular
//!  (non-#[cfg(test)]) code so that integration tests and downstream crates can use them as well.

pub mod reading;
pub mod sink;
pub mod transport;
