//! The readiness loop.
//!
//! One thread, one `mio::Poll`. The loop owns the listening socket and every
//! accepted client socket; nothing outside it touches the registration set.
//! Client sockets are edge-triggered (mio's only mode), so both accept and
//! the connection handler drain their socket until it would block.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, warn};

use crate::http::connection::{Connection, Outcome};
use crate::http::docroot::DocumentRoot;
use crate::server::error::ServerError;

pub const LISTENER: Token = Token(0);
pub const WAKER: Token = Token(1);
const FIRST_CLIENT: usize = 2;

/// Stops a running [`EventLoop`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake()
    }
}

pub struct EventLoop {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    root: DocumentRoot,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl EventLoop {
    pub fn new(
        mut listener: TcpListener,
        root: DocumentRoot,
        max_events: usize,
    ) -> Result<Self, ServerError> {
        let poll = Poll::new().map_err(ServerError::Poll)?;

        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(ServerError::Poll)?;

        let waker = Waker::new(poll.registry(), WAKER).map_err(ServerError::Poll)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(max_events.max(1)),
            listener,
            connections: HashMap::new(),
            next_token: FIRST_CLIENT,
            root,
            waker: Arc::new(waker),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
            requested: Arc::clone(&self.shutdown),
        }
    }

    /// Runs until a shutdown is triggered or the wait itself fails.
    ///
    /// Open client connections are closed when the loop is dropped.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            if let Err(e) = self.poll.poll(&mut self.events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Wait(e));
            }

            let ready: Vec<Token> = self.events.iter().map(|event| event.token()).collect();

            for token in ready {
                match token {
                    LISTENER => self.accept(),
                    WAKER => {
                        if self.shutdown.load(Ordering::SeqCst) {
                            info!(open = self.connections.len(), "Event loop stopping");
                            return Ok(());
                        }
                    }
                    token => self.dispatch(token),
                }
            }
        }
    }

    /// Accepts until the listener would block.
    ///
    /// An accept failure ends this burst but not the server; the next
    /// readiness event on the listener tries again.
    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        let token = self.allocate_token();
        let mut conn = Connection::new(stream, peer);

        if let Err(e) = self
            .poll
            .registry()
            .register(conn.stream_mut(), token, Interest::READABLE)
        {
            warn!(peer = %peer, error = %e, "Could not register connection");
            return;
        }

        debug!(peer = %peer, token = token.0, "Registered connection");
        self.connections.insert(token, conn);
    }

    fn allocate_token(&mut self) -> Token {
        loop {
            let token = Token(self.next_token);
            self.next_token = self.next_token.checked_add(1).unwrap_or(FIRST_CLIENT);
            if !self.connections.contains_key(&token) {
                return token;
            }
        }
    }

    fn dispatch(&mut self, token: Token) {
        // Already closed earlier in this batch.
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        match conn.on_ready(&self.root) {
            Outcome::Wait(interest) if interest == conn.interest() => {}
            // Rearm always goes back to the kernel so pending input raises a
            // fresh edge.
            Outcome::Wait(interest) | Outcome::Rearm(interest) => {
                match self
                    .poll
                    .registry()
                    .reregister(conn.stream_mut(), token, interest)
                {
                    Ok(()) => conn.set_interest(interest),
                    Err(e) => {
                        warn!(peer = %conn.peer(), error = %e, "Could not re-arm connection");
                        self.close(token);
                    }
                }
            }
            Outcome::Close => self.close(token),
        }
    }

    fn close(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
                debug!(peer = %conn.peer(), error = %e, "Deregister failed");
            }
            debug!(peer = %conn.peer(), token = token.0, "Closed connection");
            // Dropping `conn` closes the socket.
        }
    }
}
