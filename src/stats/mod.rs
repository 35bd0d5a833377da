use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::protocol::DeviceId;


/// Elapsed times shorter than this (but not zero) are treated as this value when computing
///  throughput.
pub const MIN_MEASURABLE_ELAPSED: Duration = Duration::from_micros(1);

/// records per second, or NaN if `elapsed` is exactly zero
pub fn throughput(num_records: u64, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return f64::NAN;
    }
    num_records as f64 / elapsed.max(MIN_MEASURABLE_ELAPSED).as_secs_f64()
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionOutcome {
    Completed,
    /// the session was terminated by an error, described here
    Failed(String),
}

/// What a session reports about itself when it is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// `None` if the session closed before a handshake completed
    pub device_id: Option<DeviceId>,
    pub elapsed: Duration,
    pub num_records: u64,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    pub fn throughput(&self) -> f64 {
        throughput(self.num_records, self.elapsed)
    }
}

impl Display for SessionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.device_id {
            Some(id) => write!(f, "device {}", id)?,
            None => write!(f, "unidentified device")?,
        }
        write!(f, ": elapsed {:.4}s, records/sec {:.2}, records {}", self.elapsed.as_secs_f64(), self.throughput(), self.num_records)?;
        if let SessionOutcome::Failed(reason) = &self.outcome {
            write!(f, " (failed: {})", reason)?;
        }
        Ok(())
    }
}

/// Aggregate over all sessions closed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub num_sessions: usize,
    pub mean_elapsed_secs: f64,
    /// mean of the sessions' individual throughputs, *not* total records divided by total time
    pub mean_throughput: f64,
    pub total_records: u64,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sessions, mean elapsed time {:.4}s, mean records/sec {:.2}, total records {}",
               self.num_sessions, self.mean_elapsed_secs, self.mean_throughput, self.total_records)
    }
}

#[derive(Debug, Default)]
struct StatsState {
    open_sessions: usize,
    elapsed: Vec<Duration>,
    throughputs: Vec<f64>,
    total_records: u64,
}

impl StatsState {
    fn summary(&self) -> Option<RunSummary> {
        if self.elapsed.is_empty() {
            return None;
        }

        let mean_elapsed_secs = self.elapsed.iter()
            .map(|d| d.as_secs_f64())
            .sum::<f64>() / self.elapsed.len() as f64;

        // sessions without measurable timing do not contribute to the mean throughput
        let defined = self.throughputs.iter()
            .filter(|t| !t.is_nan())
            .collect::<Vec<_>>();
        let mean_throughput = if defined.is_empty() {
            f64::NAN
        }
        else {
            defined.iter().copied().sum::<f64>() / defined.len() as f64
        };

        Some(RunSummary {
            num_sessions: self.elapsed.len(),
            mean_elapsed_secs,
            mean_throughput,
            total_records: self.total_records,
        })
    }
}

/// Process-wide accounting of sessions for one run. Sessions register when they are created and
///  report when they are closed; each time the number of open sessions drops to zero, a
///  [RunSummary] is published to subscribers.
///
/// This is shared between all sessions (typically as an `Arc`), updates are serialized
///  internally. The lock is never held across an await point, so updating is synchronous and can
///  happen when a session is dropped.
#[derive(Debug)]
pub struct AggregateStats {
    name: &'static str,
    state: Mutex<StatsState>,
    run_complete: watch::Sender<Option<RunSummary>>,
}

impl AggregateStats {
    pub fn new(name: &'static str) -> AggregateStats {
        AggregateStats {
            name,
            state: Default::default(),
            run_complete: watch::Sender::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, StatsState> {
        // a panic while holding the lock leaves the counters consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_opened(&self) {
        self.state().open_sessions += 1;
    }

    pub fn session_closed(&self, report: &SessionReport) {
        let throughput = report.throughput();
        if throughput.is_nan() {
            warn!("{}: session of {:?} reported zero elapsed time - throughput is undefined", self.name, report.device_id);
        }
        info!("{}: {}", self.name, report);

        let mut state = self.state();
        match state.open_sessions.checked_sub(1) {
            Some(open) => state.open_sessions = open,
            None => warn!("{}: session closed that was never registered as open", self.name),
        }
        state.elapsed.push(report.elapsed);
        state.throughputs.push(throughput);
        state.total_records += report.num_records;

        if state.open_sessions == 0 {
            if let Some(summary) = state.summary() {
                info!("{}: all sessions closed - {}", self.name, summary);
                self.run_complete.send_replace(Some(summary));
            }
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.state().open_sessions
    }

    /// summary of all sessions closed so far, `None` if there were none
    pub fn summary(&self) -> Option<RunSummary> {
        self.state().summary()
    }

    /// The receiver holds the summary published when the open session count last dropped to zero.
    pub fn subscribe(&self) -> watch::Receiver<Option<RunSummary>> {
        self.run_complete.subscribe()
    }

    /// waits until all sessions are closed, returning the run's summary
    pub async fn wait_for_completion(&self) -> anyhow::Result<RunSummary> {
        let mut receiver = self.subscribe();
        let summary = receiver.wait_for(|s| s.is_some()).await?;
        summary.clone()
            .ok_or_else(|| anyhow::anyhow!("run completion signalled without a summary"))
    }
}
