use std::net::SocketAddr;

use biostream::orchestrator::client::run_clients;
use biostream::orchestrator::config::{ClientConfig, DEFAULT_ADDR};
use clap::Parser;
use clap_derive::Parser;
use tracing::{info, Level};

#[derive(Parser)]
struct Args {
    #[clap(long, default_value = DEFAULT_ADDR)]
    server: SocketAddr,

    /// number of simulated devices, each with its own connection
    #[clap(long, default_value_t = 1)]
    num_clients: usize,

    /// readings sent per device
    #[clap(long, default_value_t = 1000)]
    num_packets: usize,

    #[clap(long, default_value_t = 100)]
    records_per_write: usize,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = ClientConfig::new(args.server);
    config.num_sessions = args.num_clients;
    config.records_per_session = args.num_packets;
    config.records_per_write = args.records_per_write;

    let summary = run_clients(&config).await?;
    info!("clients done: {}", summary);
    Ok(())
}
