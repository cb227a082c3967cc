//! Startup and the event loop.
//!
//! Startup runs leaves first: [`resolver`] turns the port argument into
//! candidate addresses, [`listener`] binds the first one that works, and
//! [`event_loop`] takes ownership of the listening socket for the life of
//! the server.

pub mod error;
pub mod event_loop;
pub mod listener;
pub mod resolver;

use std::io;
use std::net::SocketAddr;

use tracing::info;

use crate::config::Config;
use crate::http::docroot::DocumentRoot;

pub use error::ServerError;
pub use event_loop::{EventLoop, ShutdownHandle};

/// A bound server that has not started serving yet.
pub struct Server {
    event_loop: EventLoop,
}

impl Server {
    /// Resolves, binds, and listens. Every failure here is fatal.
    pub fn bind(cfg: &Config) -> Result<Self, ServerError> {
        let candidates = resolver::resolve(&cfg.port)?;
        let listener = listener::bind(&candidates)?;
        let root = DocumentRoot::new(&cfg.root);

        info!(root = %root.path().display(), "Serving files");

        let event_loop = EventLoop::new(listener, root, usize::from(cfg.max_events))?;
        Ok(Self { event_loop })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.event_loop.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.event_loop.shutdown_handle()
    }

    /// Serves until shut down. Blocks the calling thread.
    pub fn run(mut self) -> Result<(), ServerError> {
        self.event_loop.run()
    }
}
