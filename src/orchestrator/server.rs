use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, Instrument, Span};

use crate::orchestrator::config::ServerConfig;
use crate::session::connection::serve_connection;
use crate::session::Session;
use crate::sink::RowSink;
use crate::stats::{AggregateStats, RunSummary, SessionReport};


/// The collector: accepts connections from devices, runs a session per connection and writes the
///  decoded readings to a shared [RowSink].
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    sink: Arc<dyn RowSink>,
    stats: Arc<AggregateStats>,
}

impl Server {
    pub async fn bind(config: ServerConfig, sink: Arc<dyn RowSink>) -> anyhow::Result<Server> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        info!("serving on {:?}", listener.local_addr()?);

        Ok(Server {
            listener,
            config,
            sink,
            stats: Arc::new(AggregateStats::new("server")),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> Arc<AggregateStats> {
        self.stats.clone()
    }

    /// Accepts connections until the configured number of sessions was reached (if any) and all
    ///  of them are closed, returning the summary of the run. Without a configured number of
    ///  sessions, this only returns if accepting a connection fails.
    pub async fn run(self) -> anyhow::Result<RunSummary> {
        let mut sessions = JoinSet::new();
        let mut num_accepted = 0usize;

        while self.config.expected_sessions.map_or(true, |n| num_accepted < n) {
            let (stream, peer_addr) = self.listener.accept().await?;
            num_accepted += 1;

            // registered before the task is spawned, so that the open session count can not drop
            //  to zero while connections are still being accepted. A session whose task panics
            //  reports itself as failed when it is dropped.
            let session = Session::open(self.stats.clone());

            sessions.spawn(handle_connection(
                peer_addr,
                stream,
                session,
                self.sink.clone(),
                self.config.read_buf_size,
            ).instrument(Span::current()));

            while let Some(joined) = sessions.try_join_next() {
                log_join_error(joined);
            }
        }

        info!("accepted {} connections, waiting for sessions to close", num_accepted);
        while let Some(joined) = sessions.join_next().await {
            log_join_error(joined);
        }

        self.stats.wait_for_completion().await
    }
}

fn log_join_error(joined: Result<SessionReport, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("session task did not finish: {}", e);
    }
}

#[instrument(name = "accepted_connection", skip_all, fields(peer = %peer_addr))]
async fn handle_connection(
    peer_addr: SocketAddr,
    mut stream: TcpStream,
    session: Session,
    sink: Arc<dyn RowSink>,
    read_buf_size: usize,
) -> SessionReport {
    info!("connection accepted");
    // the stream is dropped on return, which closes the connection also if the session failed
    serve_connection(&mut stream, session, sink, read_buf_size).await
}

#[cfg(test)]
mod test {
    use std::time::Duration;
    use async_trait::async_trait;
    use tokio::io::AsyncWriteExt;
    use crate::protocol::reading::Reading;
    use crate::protocol::DeviceId;
    use crate::sink::MemoryRowSink;
    use crate::test_util::reading::{session_bytes, test_reading};
    use super::*;

    async fn server(expected_sessions: usize) -> (Server, Arc<MemoryRowSink>) {
        let mut config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        config.expected_sessions = Some(expected_sessions);
        let sink = Arc::new(MemoryRowSink::new());
        (Server::bind(config, sink.clone()).await.unwrap(), sink)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_completes_after_expected_sessions() {
        let (server, sink) = server(3).await;
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        let run = tokio::spawn(server.run());

        for device in 0..3i16 {
            let readings = (0..10).map(|n| test_reading(device, n)).collect::<Vec<_>>();
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&session_bytes(DeviceId(device as u32), &readings)).await.unwrap();
            stream.shutdown().await.unwrap();
        }

        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.num_sessions, 3);
        assert_eq!(summary.total_records, 30);
        assert_eq!(sink.len().await, 30);
        assert_eq!(stats.open_sessions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bad_session_does_not_affect_siblings() {
        let (server, sink) = server(2).await;
        let addr = server.local_addr().unwrap();
        let run = tokio::spawn(server.run());

        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let readings = (0..5).map(|n| test_reading(1, n)).collect::<Vec<_>>();
        let mut good = TcpStream::connect(addr).await.unwrap();
        good.write_all(&session_bytes(DeviceId(1), &readings)).await.unwrap();
        good.shutdown().await.unwrap();

        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.num_sessions, 2);
        assert_eq!(summary.total_records, 5);
        assert_eq!(sink.rows().await, readings);
        drop(bad);
    }

    /// panics when it is asked to write rows of one specific device
    #[derive(Debug)]
    struct PanickingRowSink {
        panicking_device: i16,
        rows: MemoryRowSink,
    }

    #[async_trait]
    impl RowSink for PanickingRowSink {
        async fn write_rows(&self, rows: &[Reading]) -> anyhow::Result<()> {
            if rows.iter().any(|r| r.device_tag == self.panicking_device) {
                panic!("sink bug");
            }
            self.rows.write_rows(rows).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_session_task_does_not_stall_run() {
        let mut config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        config.expected_sessions = Some(2);
        let sink = Arc::new(PanickingRowSink { panicking_device: 0, rows: MemoryRowSink::new() });

        let server = Server::bind(config, sink.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        let run = tokio::spawn(server.run());

        for device in 0..2i16 {
            let readings = (0..4).map(|n| test_reading(device, n)).collect::<Vec<_>>();
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&session_bytes(DeviceId(device as u32), &readings)).await.unwrap();
            // the server may already have dropped the panicking device's connection
            let _ = stream.shutdown().await;
        }

        let summary = tokio::time::timeout(Duration::from_secs(5), run).await
            .expect("run did not complete after a session task panicked")
            .unwrap()
            .unwrap();
        assert_eq!(summary.num_sessions, 2);
        assert_eq!(summary.total_records, 4);
        assert_eq!(stats.open_sessions(), 0);
        assert_eq!(sink.rows.len().await, 4);
    }

    #[tokio::test]
    async fn test_aborted_session_task_is_reported() {
        let stats = Arc::new(AggregateStats::new("test"));
        let session = Session::open(stats.clone());
        let (_client, mut server) = tokio::io::duplex(64);

        let task = tokio::spawn(async move {
            serve_connection(&mut server, session, Arc::new(MemoryRowSink::new()), 1024).await
        });
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let summary = stats.wait_for_completion().await.unwrap();
        assert_eq!(summary.num_sessions, 1);
        assert_eq!(stats.open_sessions(), 0);
    }
}
