use std::collections::BTreeMap;
use std::sync::Arc;

use biostream::orchestrator::client::run_clients;
use biostream::orchestrator::config::{ClientConfig, ServerConfig};
use biostream::orchestrator::server::Server;
use biostream::protocol::reading::Reading;
use biostream::sink::copy_text::CopyTextFileSink;
use biostream::sink::MemoryRowSink;
use biostream::test_util::sink::FailingRowSink;
use rstest::rstest;


fn by_device(rows: &[Reading]) -> BTreeMap<i16, Vec<Reading>> {
    let mut result = BTreeMap::<i16, Vec<Reading>>::new();
    for row in rows {
        result.entry(row.device_tag).or_default().push(*row);
    }
    result
}

#[rstest]
#[case::single(1, 1000, 100)]
#[case::several(8, 250, 7)]
#[case::empty_sessions(3, 0, 10)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clients_against_server(#[case] num_sessions: usize, #[case] records_per_session: usize, #[case] records_per_write: usize) {
    let mut server_config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    server_config.expected_sessions = Some(num_sessions);
    server_config.read_buf_size = 1000;
    let sink = Arc::new(MemoryRowSink::new());
    let server = Server::bind(server_config, sink.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let server_run = tokio::spawn(server.run());

    let mut client_config = ClientConfig::new(addr);
    client_config.num_sessions = num_sessions;
    client_config.records_per_session = records_per_session;
    client_config.records_per_write = records_per_write;
    let client_summary = run_clients(&client_config).await.unwrap();

    let server_summary = server_run.await.unwrap().unwrap();

    let expected_total = (num_sessions * records_per_session) as u64;
    assert_eq!(client_summary.num_sessions, num_sessions);
    assert_eq!(client_summary.total_records, expected_total);
    assert_eq!(server_summary.num_sessions, num_sessions);
    assert_eq!(server_summary.total_records, expected_total);

    // per device, rows arrive complete and in order
    let rows = sink.rows().await;
    assert_eq!(rows.len() as u64, expected_total);
    let devices = by_device(&rows);
    if records_per_session > 0 {
        assert_eq!(devices.keys().copied().collect::<Vec<_>>(), (0..num_sessions as i16).collect::<Vec<_>>());
    }
    for readings in devices.values() {
        assert_eq!(readings.len(), records_per_session);
        for (i, reading) in readings.iter().enumerate() {
            assert_eq!(reading.counter, i as i16);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sink_failure_is_local_to_session() {
    let mut server_config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    server_config.expected_sessions = Some(4);
    // small reads make each session issue several bulk writes
    server_config.read_buf_size = 240;
    let sink = Arc::new(FailingRowSink::new(3));
    let server = Server::bind(server_config, sink.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let server_run = tokio::spawn(server.run());

    let mut client_config = ClientConfig::new(addr);
    client_config.num_sessions = 4;
    client_config.records_per_session = 100;
    client_config.records_per_write = 10;
    let client_summary = run_clients(&client_config).await.unwrap();
    assert_eq!(client_summary.num_sessions, 4);

    let server_summary = server_run.await.unwrap().unwrap();
    assert_eq!(server_summary.num_sessions, 4);
    assert_eq!(server_summary.total_records, sink.rows().await.len() as u64);
    assert!(server_summary.total_records < 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_copy_text_output() {
    let path = std::env::temp_dir().join(format!("biostream-loopback-{}.txt", std::process::id()));

    let mut server_config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    server_config.expected_sessions = Some(2);
    let sink = Arc::new(CopyTextFileSink::create(&path).await.unwrap());
    let server = Server::bind(server_config, sink).await.unwrap();
    let addr = server.local_addr().unwrap();
    let server_run = tokio::spawn(server.run());

    let mut client_config = ClientConfig::new(addr);
    client_config.num_sessions = 2;
    client_config.records_per_session = 20;
    run_clients(&client_config).await.unwrap();
    server_run.await.unwrap().unwrap();

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(content.lines().count(), 40);
    assert!(content.lines().all(|l| l.split('\t').count() == 12));

    tokio::fs::remove_file(&path).await.unwrap();
}
