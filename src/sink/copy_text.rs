use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

use crate::protocol::reading::Reading;
use crate::sink::RowSink;


/// Column order of the `readings` table the rows are intended for.
pub const READINGS_COLUMNS: [&str; 12] = [
    "device_id", "counter",
    "channel1", "channel2", "channel3", "channel4", "channel5",
    "channel6", "channel7", "channel8", "channel9", "channel10",
];

/// Appends rows to a file in PostgreSQL's `COPY ... FROM STDIN` text format: one line per row,
///  columns separated by tabs. The file can be loaded with
///  `\copy readings FROM '<file>'` into a table with [READINGS_COLUMNS].
///
/// Each bulk write is formatted completely before it is written, so rows of concurrent sessions
///  never interleave within a batch.
#[derive(Debug)]
pub struct CopyTextFileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl CopyTextFileSink {
    /// creates or truncates the file at `path`
    pub async fn create(path: impl AsRef<Path>) -> anyhow::Result<CopyTextFileSink> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        debug!(?path, "opened COPY text file");

        Ok(CopyTextFileSink {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn format_copy_rows(rows: &[Reading]) -> String {
    let mut result = String::with_capacity(rows.len() * 64);
    for row in rows {
        for (i, field) in row.fields().iter().enumerate() {
            if i > 0 {
                result.push('\t');
            }
            // writing to a String does not fail
            let _ = write!(result, "{}", field);
        }
        result.push('\n');
    }
    result
}

#[async_trait]
impl RowSink for CopyTextFileSink {
    async fn write_rows(&self, rows: &[Reading]) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let formatted = format_copy_rows(rows);
        self.writer.lock().await
            .write_all(formatted.as_bytes())
            .await?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        self.writer.lock().await
            .flush()
            .await?;
        Ok(())
    }
}
