use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::generator::ReadingGenerator;
use crate::orchestrator::config::ClientConfig;
use crate::orchestrator::DeviceIdAllocator;
use crate::protocol::handshake::put_handshake;
use crate::protocol::reading::{encode_record, Reading};
use crate::protocol::{DeviceId, HANDSHAKE_LEN, RECORD_SIZE};
use crate::stats::{AggregateStats, RunSummary, SessionOutcome, SessionReport};


/// Runs the configured number of simulated devices concurrently, each in its own session against
///  the server. Returns when all sessions are closed.
///
/// A failing session is reported like any other, it does not affect its siblings.
pub async fn run_clients(config: &ClientConfig) -> anyhow::Result<RunSummary> {
    let stats = Arc::new(AggregateStats::new("client"));
    let mut allocator = DeviceIdAllocator::new();
    let device_ids = (0..config.num_sessions)
        .map(|_| allocator.allocate())
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut sessions = JoinSet::new();

    // all sessions are registered before any of them runs, so the run is not considered complete
    //  before the last one is closed
    for _ in &device_ids {
        stats.session_opened();
    }

    for device_id in device_ids {
        sessions.spawn(run_client_session(
            config.server_addr,
            device_id,
            config.records_per_session,
            config.records_per_write,
            stats.clone(),
        ));
    }

    while let Some(joined) = sessions.join_next().await {
        if let Err(e) = joined {
            error!("client session task did not finish: {}", e);
        }
    }

    let summary = stats.summary()
        .ok_or_else(|| anyhow!("no client sessions were run"))?;
    info!("total records sent: {}", summary.total_records);
    Ok(summary)
}

#[instrument(name = "client_session", skip_all, fields(device_id = %device_id))]
async fn run_client_session(
    server_addr: SocketAddr,
    device_id: DeviceId,
    num_records: usize,
    records_per_write: usize,
    stats: Arc<AggregateStats>,
) -> SessionReport {
    let started = Instant::now();
    let mut num_sent = 0;

    let result: anyhow::Result<()> = async {
        let mut stream = TcpStream::connect(server_addr).await?;
        debug!("connected to {:?}", server_addr);
        let readings = ReadingGenerator::new(device_id, num_records);
        send_session(&mut stream, device_id, readings, records_per_write, &mut num_sent).await
    }.await;

    let outcome = match result {
        Ok(()) => SessionOutcome::Completed,
        Err(e) => {
            warn!("client session failed after {} records: {:#}", num_sent, e);
            SessionOutcome::Failed(format!("{:#}", e))
        }
    };

    let report = SessionReport {
        device_id: Some(device_id),
        elapsed: started.elapsed(),
        num_records: num_sent,
        outcome,
    };
    stats.session_closed(&report);
    report
}

/// Writes a complete session to `transport`: the handshake, then all `readings` in writes of up to
///  `records_per_write` records each, then shuts the transport down. `num_sent` counts the
///  records that were written successfully.
pub async fn send_session<W: AsyncWrite + Unpin>(
    transport: &mut W,
    device_id: DeviceId,
    readings: impl Iterator<Item = Reading>,
    records_per_write: usize,
    num_sent: &mut u64,
) -> anyhow::Result<()> {
    let records_per_write = records_per_write.max(1);
    let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN.max(records_per_write * RECORD_SIZE));

    put_handshake(device_id, &mut buf);
    transport.write_all(&buf).await?;
    buf.clear();

    let mut pending = 0usize;
    for reading in readings {
        encode_record(&reading, &mut buf);
        pending += 1;

        if pending == records_per_write {
            transport.write_all(&buf).await?;
            *num_sent += pending as u64;
            pending = 0;
            buf.clear();
        }
    }
    if pending > 0 {
        transport.write_all(&buf).await?;
        *num_sent += pending as u64;
    }

    transport.shutdown().await?;
    Ok(())
}
