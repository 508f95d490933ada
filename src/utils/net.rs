use std::net::SocketAddr;
use std::net::TcpListener;

use rand::Rng;

use crate::constants::PORT_PROBE_ATTEMPTS;
use crate::StartupError;

/// Reserve a loopback endpoint by binding it. The listener is held for the
/// node's lifetime so no other process can claim the port.
pub(crate) fn bind_endpoint(port: u16) -> std::result::Result<(TcpListener, SocketAddr), StartupError> {
    let requested = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&requested).map_err(|source| StartupError::PortUnavailable {
        endpoint: requested,
        source,
    })?;
    let addr = listener.local_addr().map_err(|source| StartupError::PortUnavailable {
        endpoint: format!("127.0.0.1:{}", port),
        source,
    })?;
    Ok((listener, addr))
}

/// Pick a free ephemeral loopback endpoint, probing a bounded number of
/// random candidates before giving up.
pub(crate) fn bind_ephemeral() -> std::result::Result<(TcpListener, SocketAddr), StartupError> {
    let mut rng = rand::thread_rng();
    let mut last_err = None;
    for _ in 0..PORT_PROBE_ATTEMPTS {
        let candidate: u16 = rng.gen_range(20_000..60_000);
        match bind_endpoint(candidate) {
            Ok(bound) => return Ok(bound),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or(StartupError::InvalidOptions("no ephemeral port available".to_string())))
}
