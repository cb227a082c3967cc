use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Failures that stop the server.
///
/// Everything here is fatal: the binary logs it and exits. Errors on a single
/// client connection never surface as a `ServerError`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not resolve port {port:?}: {reason}")]
    Resolution { port: String, reason: String },

    #[error("could not bind to any of {attempted} candidate address(es)")]
    Bind {
        attempted: usize,
        #[source]
        last: Option<io::Error>,
    },

    #[error("listen failed on {addr}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to create event loop")]
    Poll(#[source] io::Error),

    #[error("waiting for readiness events failed")]
    Wait(#[source] io::Error),
}
