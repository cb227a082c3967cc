use std::io;
use std::net::TcpListener as StdTcpListener;

use mio::net::TcpListener;
use socket2::Socket;
use tracing::{info, warn};

use crate::server::error::ServerError;
use crate::server::resolver::Candidate;

pub const BACKLOG: i32 = 26;

/// Binds the first candidate that accepts a bind and starts listening on it.
///
/// Candidates after the first successful bind are never tried. The returned
/// listener is non-blocking and ready to be registered with the event loop.
pub fn bind(candidates: &[Candidate]) -> Result<TcpListener, ServerError> {
    let mut last = None;

    for candidate in candidates {
        let socket = match open(candidate) {
            Ok(socket) => socket,
            Err(e) => {
                warn!(addr = %candidate.addr, error = %e, "Bind failed");
                last = Some(e);
                continue;
            }
        };

        if let Err(e) = socket.listen(BACKLOG) {
            return Err(ServerError::Listen {
                addr: candidate.addr,
                source: e,
            });
        }

        let listener: StdTcpListener = socket.into();
        let local = listener.local_addr().unwrap_or(candidate.addr);
        info!("Listening on address: {}, PORT: {}", local.ip(), local.port());

        return Ok(TcpListener::from_std(listener));
    }

    Err(ServerError::Bind {
        attempted: candidates.len(),
        last,
    })
}

fn open(candidate: &Candidate) -> io::Result<Socket> {
    let socket = Socket::new(candidate.domain, candidate.socket_type, candidate.protocol)?;

    if let Err(e) = socket.set_reuse_address(true) {
        warn!(addr = %candidate.addr, error = %e, "Could not enable address reuse");
    }

    if candidate.addr.is_ipv6() {
        // Keep the v6 wildcard from also claiming the v4 port.
        if let Err(e) = socket.set_only_v6(true) {
            warn!(addr = %candidate.addr, error = %e, "Could not restrict socket to IPv6");
        }
    }

    socket.set_nonblocking(true)?;
    socket.bind(&candidate.addr.into())?;
    Ok(socket)
}
