pub mod client;
pub mod config;
pub mod server;

use anyhow::anyhow;

use crate::protocol::DeviceId;


/// Hands out device ids sequentially, starting at 0. Each run has its own allocator, so ids are
///  unique per run.
#[derive(Debug)]
pub struct DeviceIdAllocator {
    /// `None` once the id space is exhausted
    next: Option<u32>,
}

impl Default for DeviceIdAllocator {
    fn default() -> Self {
        DeviceIdAllocator::new()
    }
}

impl DeviceIdAllocator {
    pub fn new() -> DeviceIdAllocator {
        DeviceIdAllocator {
            next: Some(0),
        }
    }

    /// fails once all `u32` ids were handed out, ids are never reused
    pub fn allocate(&mut self) -> anyhow::Result<DeviceId> {
        let id = self.next
            .ok_or_else(|| anyhow!("all device ids were allocated"))?;
        self.next = id.checked_add(1);
        Ok(DeviceId(id))
    }
}
