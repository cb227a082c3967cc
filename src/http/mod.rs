//! HTTP handling for one client connection.
//!
//! The server understands exactly one request per connection and only looks
//! at the request target on the first line. Everything else the client sends
//! is read and ignored.
//!
//! - **`connection`**: the per-connection state machine driven by readiness events
//! - **`parser`**: extracts the request target from the request line
//! - **`request`**: the parsed request
//! - **`docroot`**: maps a request target onto a file under the document root
//! - **`response`**: the two responses the server can send
//! - **`writer`**: serializes a response and streams it without blocking
//! - **`error`**: per-connection failures
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← drain socket until the request line is complete
//!        └──────┬──────┘   (would-block: stay armed for READABLE)
//!               │ request line parsed, path resolved
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← head, then file chunks; input is discarded
//!        └──────┬───────────┘   (would-block: armed for READABLE | WRITABLE)
//!               │ response sent, write half shut down
//!               ▼
//!        ┌──────────────────┐
//!        │    Lingering     │ ← discard input until EOF or 1 MiB
//!        └──────┬───────────┘   (would-block: armed for READABLE)
//!               │ peer closed, limit reached, or any failure
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │ → event loop deregisters and closes
//!        └──────────────────┘
//! ```

pub mod connection;
pub mod docroot;
pub mod error;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
