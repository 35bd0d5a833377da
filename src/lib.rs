pub mod generator;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod stats;
pub mod util;
pub mod test_util;
