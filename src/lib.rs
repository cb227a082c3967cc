//! Lantern - static file server
//!
//! Single-threaded HTTP server built on a readiness event loop. Serves files
//! from one document root, one request per connection.

pub mod config;
pub mod http;
pub mod server;
