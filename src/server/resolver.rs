//! Bind address resolution.
//!
//! A thin layer over the system resolver: `getaddrinfo` with no host and
//! `AI_PASSIVE`, so numeric ports and service names both go through NSS and
//! the answers are wildcard addresses suitable for a listening socket.

use std::io;
use std::net::SocketAddr;

use dns_lookup::{AddrInfoHints, getaddrinfo};
use socket2::{Domain, Protocol, Type};

use crate::server::error::ServerError;

/// One address the listener may try to bind, with the family, socket type
/// and protocol the resolver reported for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub addr: SocketAddr,
    pub domain: Domain,
    pub socket_type: Type,
    pub protocol: Option<Protocol>,
}

impl Candidate {
    /// A TCP stream candidate for `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            domain: Domain::for_address(addr),
            socket_type: Type::STREAM,
            protocol: Some(Protocol::TCP),
        }
    }
}

/// Resolves `port` (number or service name) into passive IPv4 candidates,
/// in the order the resolver returns them.
pub fn resolve(port: &str) -> Result<Vec<Candidate>, ServerError> {
    let failed = |reason: String| ServerError::Resolution {
        port: port.to_string(),
        reason,
    };

    if port.trim().is_empty() {
        return Err(failed("empty port".to_string()));
    }

    // getaddrinfo does not range-check numeric services.
    if port.bytes().all(|b| b.is_ascii_digit()) {
        port.parse::<u16>().map_err(|e| failed(e.to_string()))?;
    }

    let hints = AddrInfoHints {
        flags: libc::AI_PASSIVE,
        address: libc::AF_INET,
        socktype: libc::SOCK_STREAM,
        protocol: 0,
    };

    let answers = getaddrinfo(None, Some(port), Some(hints))
        .map_err(|e| failed(io::Error::from(e).to_string()))?;

    let mut candidates = Vec::new();
    for answer in answers {
        let answer = answer.map_err(|e| failed(e.to_string()))?;
        candidates.push(Candidate {
            addr: answer.sockaddr,
            domain: Domain::from(answer.address),
            socket_type: Type::from(answer.socktype),
            protocol: (answer.protocol != 0).then(|| Protocol::from(answer.protocol)),
        });
    }

    if candidates.is_empty() {
        return Err(failed("resolver returned no addresses".to_string()));
    }

    Ok(candidates)
}
