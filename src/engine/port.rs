//! Local port selection for engine launches.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::defaults;

const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Check whether something is listening on a local port.
///
/// Advisory only: a connection refusal means the port is free right now,
/// not that it is reserved. Callers must still handle bind failures.
pub fn is_port_in_use(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    match TcpStream::connect_timeout(&addr, PROBE_TIMEOUT) {
        Ok(_) => true,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => false,
        // Anything other than a clean refusal is treated as occupied.
        Err(_) => true,
    }
}

/// Pick a pseudo-random unprivileged port with no live listener.
pub fn allocate_port() -> u16 {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    loop {
        let candidate = rng.gen_range(defaults::PORT_RANGE_START..=defaults::PORT_RANGE_END);
        if !is_port_in_use(candidate) {
            return candidate;
        }
        log::debug!("Port {} is in use, re-rolling", candidate);
    }
}
