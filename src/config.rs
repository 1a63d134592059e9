use std::net::SocketAddr;

use clap::Parser;

pub const DEFAULT_PORT: u16 = 9324;

/// Exports Docker container lifecycle state as Prometheus metrics.
#[derive(Debug, Clone, Parser)]
#[command(name = "container-exporter", version)]
pub struct Config {
    /// Bind socket to this port.
    #[arg(long, env = "CONTAINER_EXPORTER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Config {
    /// Address the exporter listens on: every interface, configured port.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
