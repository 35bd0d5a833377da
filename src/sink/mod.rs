pub mod copy_text;

use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::sync::Mutex;

use crate::protocol::reading::Reading;


/// The persistence side of a collector: receives decoded readings in bulk.
///
/// A sink is shared by all sessions of a server, and it must serialize concurrent calls
///  internally: each `write_rows` call is atomic with respect to calls from other sessions. Rows
///  passed in a single call are in the order they arrived on their connection; there is no
///  ordering across sessions.
///
/// A failed write is final for the calling session - there is no retry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RowSink: Debug + Send + Sync + 'static {
    async fn write_rows(&self, rows: &[Reading]) -> anyhow::Result<()>;

    /// called when a session closes, to make its rows durable
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps all rows in memory. Useful for tests and dry runs without a store.
#[derive(Debug, Default)]
pub struct MemoryRowSink {
    rows: Mutex<Vec<Reading>>,
}

impl MemoryRowSink {
    pub fn new() -> MemoryRowSink {
        Default::default()
    }

    pub async fn rows(&self) -> Vec<Reading> {
        self.rows.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl RowSink for MemoryRowSink {
    async fn write_rows(&self, rows: &[Reading]) -> anyhow::Result<()> {
        self.rows.lock().await
            .extend_from_slice(rows);
        Ok(())
    }
}
