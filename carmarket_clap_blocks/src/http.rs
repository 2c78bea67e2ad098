//! HTTP listener arguments.

use std::net::{SocketAddr, ToSocketAddrs};

/// 10 MiB
pub const DEFAULT_MAX_HTTP_REQUEST_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct HttpArgs {
    /// Address the HTTP API listens on, host names are resolved
    #[clap(
        long = "http-bind",
        env = "CARMARKET_HTTP_BIND_ADDR",
        default_value = "0.0.0.0:5000",
        value_parser = parse_socket_addr,
        action
    )]
    pub http_bind_address: SocketAddr,

    /// Largest request body accepted, in bytes
    #[clap(
        long = "max-http-request-size",
        env = "CARMARKET_MAX_HTTP_REQUEST_SIZE",
        default_value_t = DEFAULT_MAX_HTTP_REQUEST_SIZE,
        action
    )]
    pub max_http_request_size: usize,
}

/// Parse `host:port`, resolving `host` and taking the first address found
pub fn parse_socket_addr(s: &str) -> Result<SocketAddr, String> {
    s.to_socket_addrs()
        .map_err(|e| format!("Cannot parse socket address '{s}': {e}"))?
        .next()
        .ok_or_else(|| format!("Found no addresses for '{s}'"))
}
