use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};

pub mod client;
pub mod serve_tcp;
pub mod serve_udp;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interactive fail-over chat client.
    Client(ClientArgs),
    /// Start the reliable-channel broadcast server.
    ServeTcp(ServeTcpArgs),
    /// Start the best-effort echo server.
    ServeUdp(ServeUdpArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Client(args) => client::run(args),
        Command::ServeTcp(args) => serve_tcp::run(args),
        Command::ServeUdp(args) => serve_udp::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Server address.
    #[arg(long)]
    pub host: String,
    /// Server TCP port.
    #[arg(long, default_value_t = 9000)]
    pub tcp_port: u16,
    /// Server UDP port.
    #[arg(long, default_value_t = 9001)]
    pub udp_port: u16,
    /// Display name prepended to outgoing lines.
    #[arg(long, short = 'n')]
    pub nick: Option<String>,
    /// Heartbeat interval (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub probe_interval: String,
    /// Heartbeat reply timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub probe_timeout: String,
    /// Consecutive probe failures before switching channels.
    #[arg(long, default_value_t = 3)]
    pub fail_threshold: u32,
}

#[derive(Args, Debug)]
pub struct ServeTcpArgs {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// TCP port.
    #[arg(long, default_value_t = 9000)]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct ServeUdpArgs {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// UDP port.
    #[arg(long, default_value_t = 9001)]
    pub port: u16,
}

/// Resolve a host/port pair, taking the first address.
pub fn resolve_addr(host: &str, port: u16) -> CliResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("cannot resolve {host}:{port}: {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("no addresses for {host}:{port}")))
}

/// Parse a humane duration string: `2s`, `150ms`, or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(number) = input.strip_suffix("ms") {
        (number, "ms")
    } else if let Some(number) = input.strip_suffix('s') {
        (number, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Flip `running` to false on Ctrl-C so blocking loops can wind down.
pub fn install_ctrlc(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn resolve_addr_accepts_literal_ips() {
        let addr = resolve_addr("127.0.0.1", 9000).unwrap();
        assert_eq!(addr.port(), 9000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn resolve_addr_rejects_garbage() {
        let err = resolve_addr("definitely not a host name", 9000).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
