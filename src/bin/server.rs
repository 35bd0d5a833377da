use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use biostream::orchestrator::config::{ServerConfig, DEFAULT_ADDR};
use biostream::orchestrator::server::Server;
use biostream::sink::copy_text::CopyTextFileSink;
use biostream::sink::{MemoryRowSink, RowSink};
use clap::Parser;
use clap_derive::Parser;
use tracing::{info, Level};

#[derive(Parser)]
struct Args {
    #[clap(long, default_value = DEFAULT_ADDR)]
    listen: SocketAddr,

    /// stop after this many sessions were served
    #[clap(long)]
    expected_sessions: Option<usize>,

    /// file receiving the readings in COPY text format; readings are kept in memory if omitted
    #[clap(long)]
    output: Option<PathBuf>,

    #[clap(long, default_value_t = 64 * 1024)]
    read_buf_size: usize,

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

    let sink: Arc<dyn RowSink> = match &args.output {
        Some(path) => Arc::new(CopyTextFileSink::create(path).await?),
        None => Arc::new(MemoryRowSink::new()),
    };

    let mut config = ServerConfig::new(args.listen);
    config.expected_sessions = args.expected_sessions;
    config.read_buf_size = args.read_buf_size;

    let server = Server::bind(config, sink).await?;
    let summary = server.run().await?;
    info!("server done: {}", summary);
    Ok(())
}
