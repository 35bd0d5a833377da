pub mod connection;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::protocol::reassembly::ReassemblyBuffer;
use crate::protocol::{DeviceId, ProtocolError};
use crate::sink::RowSink;
use crate::stats::{AggregateStats, SessionOutcome, SessionReport};


#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    AwaitingHandshake,
    Streaming,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("bad handshake: {0}")]
    BadHandshake(#[from] ProtocolError),
    #[error("sink rejected bulk write: {0:#}")]
    SinkWriteFailure(anyhow::Error),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// data arrived for a session that was terminated earlier, with that session's failure
    #[error("session is closed: {0}")]
    Closed(String),
}

/// The receiving side of a single connection: turns the connection's bytes into readings and
///  forwards them to a [RowSink].
///
/// A session is owned by whatever handles its connection's I/O and must not be shared. It is
///  registered with [AggregateStats] when it is opened and reported exactly once: by
///  [Session::close], or as failed when it is dropped without being closed (e.g. because the task
///  owning it panicked).
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    device_id: Option<DeviceId>,
    started: Instant,
    num_records: u64,
    buffer: ReassemblyBuffer,
    failure: Option<String>,
    sink_failed: bool,
    stats: Arc<AggregateStats>,
    reported: bool,
}

impl Session {
    pub fn open(stats: Arc<AggregateStats>) -> Session {
        stats.session_opened();
        Session {
            state: SessionState::AwaitingHandshake,
            device_id: None,
            started: Instant::now(),
            num_records: 0,
            buffer: ReassemblyBuffer::new(),
            failure: None,
            sink_failed: false,
            stats,
            reported: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    /// Processes bytes as they arrived from the transport, returning the number of records that
    ///  were written to the sink as a result.
    ///
    /// An error means the session is closed now, and the transport should be terminated. Bytes
    ///  arriving after that are discarded, and each call returns [SessionError::Closed] with the
    ///  original failure.
    pub async fn on_bytes(&mut self, data: &[u8], sink: &dyn RowSink) -> Result<usize, SessionError> {
        if self.state == SessionState::Closed {
            trace!(len = data.len(), "session is closed - discarding data");
            let reason = self.failure.clone().unwrap_or_else(|| "closed without failure".to_string());
            return Err(SessionError::Closed(reason));
        }

        self.buffer.append(data);

        if self.state == SessionState::AwaitingHandshake {
            match self.buffer.take_handshake() {
                Ok(None) => return Ok(0),
                Ok(Some(device_id)) => {
                    debug!(%device_id, "handshake complete");
                    self.device_id = Some(device_id);
                    self.state = SessionState::Streaming;
                }
                Err(e) => {
                    return Err(self.fail(e.into()));
                }
            }
        }

        let records = self.buffer.drain_records();
        if records.is_empty() {
            return Ok(0);
        }

        // the whole batch is lost if the write fails, there is no retry
        if let Err(e) = sink.write_rows(&records).await {
            self.sink_failed = true;
            return Err(self.fail(SessionError::SinkWriteFailure(e)));
        }
        self.num_records += records.len() as u64;
        Ok(records.len())
    }

    /// Terminates the session because of an error. The error is recorded for the session's
    ///  report and handed back to the caller.
    pub fn fail(&mut self, error: SessionError) -> SessionError {
        warn!(device_id = ?self.device_id, "closing session: {}", error);
        self.state = SessionState::Closed;
        if self.failure.is_none() {
            self.failure = Some(error.to_string());
        }
        self.buffer.clear();
        error
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// true if the sink rejected one of this session's writes
    pub fn sink_failed(&self) -> bool {
        self.sink_failed
    }

    /// Closes the session (from whatever state it is in) and reports it.
    pub fn close(mut self) -> SessionReport {
        if !self.buffer.is_empty() {
            debug!(device_id = ?self.device_id, retained = self.buffer.len(), "discarding incomplete frame at end of session");
        }
        self.report()
    }

    fn report(&mut self) -> SessionReport {
        self.buffer.clear();
        self.state = SessionState::Closed;
        self.reported = true;

        let report = SessionReport {
            device_id: self.device_id,
            elapsed: self.started.elapsed(),
            num_records: self.num_records,
            outcome: match self.failure.take() {
                None => SessionOutcome::Completed,
                Some(reason) => SessionOutcome::Failed(reason),
            },
        };
        self.stats.session_closed(&report);
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        let reason = if std::thread::panicking() {
            "session aborted by a panic"
        }
        else {
            "session dropped without being closed"
        };
        warn!(device_id = ?self.device_id, "{}", reason);
        if self.failure.is_none() {
            self.failure = Some(reason.to_string());
        }
        self.report();
    }
}
