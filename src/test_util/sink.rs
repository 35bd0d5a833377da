use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use async_trait::async_trait;

use crate::protocol::reading::Reading;
use crate::sink::{MemoryRowSink, RowSink};


/// A [RowSink] that accepts a given number of bulk writes and rejects every write after that.
///  Accepted rows and the number of flushes are kept for inspection.
#[derive(Debug)]
pub struct FailingRowSink {
    accepted_writes: usize,
    num_writes: AtomicUsize,
    num_flushes: AtomicUsize,
    rows: MemoryRowSink,
}

impl FailingRowSink {
    pub fn new(accepted_writes: usize) -> FailingRowSink {
        FailingRowSink {
            accepted_writes,
            num_writes: AtomicUsize::new(0),
            num_flushes: AtomicUsize::new(0),
            rows: MemoryRowSink::new(),
        }
    }

    pub async fn rows(&self) -> Vec<Reading> {
        self.rows.rows().await
    }

    pub fn num_flushes(&self) -> usize {
        self.num_flushes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RowSink for FailingRowSink {
    async fn write_rows(&self, rows: &[Reading]) -> anyhow::Result<()> {
        if self.num_writes.fetch_add(1, Ordering::AcqRel) >= self.accepted_writes {
            bail!("simulated sink failure");
        }
        self.rows.write_rows(rows).await
    }

    async fn flush(&self) -> anyhow::Result<()> {
        self.num_flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
