use std::net::SocketAddr;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    /// number of concurrent sessions, each simulating one device
    pub num_sessions: usize,
    pub records_per_session: usize,
    /// number of records that are encoded into a single write to the connection
    pub records_per_write: usize,
}

impl ClientConfig {
    pub fn new(server_addr: SocketAddr) -> ClientConfig {
        ClientConfig {
            server_addr,
            num_sessions: 1,
            records_per_session: 1000,
            records_per_write: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// If set, the server stops accepting connections after this many, and its run is complete
    ///  when all of them are closed. Otherwise it accepts connections until it fails.
    pub expected_sessions: Option<usize>,
    pub read_buf_size: usize,
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> ServerConfig {
        ServerConfig {
            listen_addr,
            expected_sessions: None,
            read_buf_size: 64 * 1024,
        }
    }
}
