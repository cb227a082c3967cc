use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};

use bytes::BytesMut;
use mio::Interest;
use mio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::http::docroot::{DocumentRoot, Resolution};
use crate::http::error::ConnectionError;
use crate::http::parser::{MAX_REQUEST_LINE, ParseError, parse_http_request, parse_request_line};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::{ResponseWriter, WriteStatus};

const READ_CHUNK: usize = 1024;

/// Upper bound on bytes pulled off the socket in one readiness event.
const DRAIN_LIMIT: usize = 64 * 1024;

/// Bytes discarded after the response before giving up on a clean close.
const LINGER_LIMIT: usize = 1024 * 1024;

/// Closing the sending half of a socket.
pub trait HalfClose {
    fn shutdown_write(&self) -> io::Result<()>;
}

impl HalfClose for TcpStream {
    fn shutdown_write(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }
}

enum ConnectionState {
    Reading,
    Writing(ResponseWriter),
    /// Response sent and write half shut; discarding input until the peer
    /// closes so the final close does not reset the connection.
    Lingering { discarded: usize },
    Closed,
}

/// What the event loop should do with the socket after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep the registration, armed for this interest.
    Wait(Interest),
    /// Re-register even if the interest is unchanged: input is still
    /// pending but this event's drain budget is spent.
    Rearm(Interest),
    /// Deregister and close.
    Close,
}

enum ReadStatus {
    Pending,
    PeerClosed,
    Ready(Request),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    WouldBlock,
    Eof,
    Limit,
}

/// One client connection, from first byte read to response sent.
///
/// The connection is driven by readiness events and never blocks: each call
/// to [`Connection::on_ready`] makes as much progress as the socket allows
/// and reports whether it is waiting on the socket or finished.
pub struct Connection<S = TcpStream> {
    stream: S,
    peer: SocketAddr,
    buffer: BytesMut,
    state: ConnectionState,
    interest: Interest,
}

impl<S: Read + Write + HalfClose> Connection<S> {
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(MAX_REQUEST_LINE),
            state: ConnectionState::Reading,
            interest: Interest::READABLE,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// The interest the socket is currently registered with.
    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn set_interest(&mut self, interest: Interest) {
        self.interest = interest;
    }

    /// Handles one readiness event.
    ///
    /// Failures are logged here and reported as `Close`; the caller only
    /// learns that the connection is finished.
    pub fn on_ready(&mut self, root: &DocumentRoot) -> Outcome {
        match self.advance(root) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(peer = %self.peer, error = %e, "Connection failed");
                self.state = ConnectionState::Closed;
                Outcome::Close
            }
        }
    }

    /// Runs the state machine until it has to wait on the socket or is done.
    pub fn advance(&mut self, root: &DocumentRoot) -> Result<Outcome, ConnectionError> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => match self.read_request()? {
                    ReadStatus::Pending => {
                        debug!(peer = %self.peer, buffered = self.buffer.len(), "Waiting for request line");
                        return Ok(Outcome::Wait(Interest::READABLE));
                    }
                    ReadStatus::PeerClosed => {
                        debug!(peer = %self.peer, "Peer closed before sending a request");
                        self.state = ConnectionState::Closed;
                    }
                    ReadStatus::Ready(request) => {
                        let response = self.respond(root, &request);
                        self.state = ConnectionState::Writing(ResponseWriter::new(response));
                    }
                },

                ConnectionState::Writing(writer) => {
                    // Request bytes past the first line are still arriving.
                    let (input, _) = drain(&mut self.stream, DRAIN_LIMIT)?;

                    match writer.write_to(&mut self.stream)? {
                        WriteStatus::Blocked => {
                            debug!(peer = %self.peer, sent = writer.body_bytes(), "Send would block");
                            let interest = Interest::READABLE | Interest::WRITABLE;
                            return Ok(match input {
                                Drain::Limit => Outcome::Rearm(interest),
                                _ => Outcome::Wait(interest),
                            });
                        }
                        WriteStatus::Complete => {
                            debug!(
                                peer = %self.peer,
                                status = writer.status().as_u16(),
                                bytes = writer.body_bytes(),
                                "Response sent"
                            );
                            self.state = match self.stream.shutdown_write() {
                                Ok(()) => ConnectionState::Lingering { discarded: 0 },
                                Err(e) => {
                                    debug!(peer = %self.peer, error = %e, "Shutdown failed");
                                    ConnectionState::Closed
                                }
                            };
                        }
                    }
                }

                ConnectionState::Lingering { discarded } => {
                    let input = match drain(&mut self.stream, DRAIN_LIMIT) {
                        Ok((input, n)) => {
                            *discarded += n;
                            input
                        }
                        Err(e) => {
                            // The response is already out; nothing left to fail.
                            debug!(peer = %self.peer, error = %e, "Read after response failed");
                            Drain::Eof
                        }
                    };

                    match input {
                        Drain::Eof => self.state = ConnectionState::Closed,
                        _ if *discarded >= LINGER_LIMIT => {
                            debug!(peer = %self.peer, "Peer kept sending after response");
                            self.state = ConnectionState::Closed;
                        }
                        Drain::WouldBlock => return Ok(Outcome::Wait(Interest::READABLE)),
                        Drain::Limit => return Ok(Outcome::Rearm(Interest::READABLE)),
                    }
                }

                ConnectionState::Closed => return Ok(Outcome::Close),
            }
        }
    }

    /// Drains the socket until it would block, keeping at most
    /// `MAX_REQUEST_LINE` bytes. Whatever the drain limit leaves unread is
    /// picked up by the `Writing` state.
    fn read_request(&mut self) -> Result<ReadStatus, ConnectionError> {
        let mut temp = [0u8; READ_CHUNK];
        let mut drained = 0;
        let mut eof = false;

        while drained < DRAIN_LIMIT {
            match self.stream.read(&mut temp) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    drained += n;
                    let room = MAX_REQUEST_LINE - self.buffer.len();
                    self.buffer.extend_from_slice(&temp[..n.min(room)]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ConnectionError::Read(e)),
            }
        }

        if self.buffer.is_empty() {
            return Ok(if eof {
                ReadStatus::PeerClosed
            } else {
                ReadStatus::Pending
            });
        }

        match parse_http_request(&self.buffer) {
            Ok(request) => Ok(ReadStatus::Ready(request)),
            // A half-closed peer will send nothing more: take what arrived.
            Err(ParseError::Incomplete) if eof => {
                Ok(ReadStatus::Ready(parse_request_line(&self.buffer)?))
            }
            Err(ParseError::Incomplete) => Ok(ReadStatus::Pending),
            Err(e) => Err(e.into()),
        }
    }

    fn respond(&self, root: &DocumentRoot, request: &Request) -> Response {
        match root.resolve(request) {
            Resolution::Found { path, file } => {
                info!(peer = %self.peer, uri = %path.display(), status = 200, "Connection from {}", self.peer.ip());
                Response::ok(file)
            }
            Resolution::NotFound { path } => {
                info!(peer = %self.peer, uri = %path.display(), status = 404, "Connection from {}", self.peer.ip());
                Response::not_found()
            }
            Resolution::Escapes { path } => {
                warn!(peer = %self.peer, uri = %path.display(), "Rejected path outside document root");
                Response::not_found()
            }
        }
    }
}

/// Reads and discards input until the socket would block, reports EOF, or
/// `limit` bytes have gone by. Returns how it stopped and the byte count.
fn drain<S: Read>(stream: &mut S, limit: usize) -> Result<(Drain, usize), ConnectionError> {
    let mut temp = [0u8; READ_CHUNK];
    let mut drained = 0;

    while drained < limit {
        match stream.read(&mut temp) {
            Ok(0) => return Ok((Drain::Eof, drained)),
            Ok(n) => drained += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok((Drain::WouldBlock, drained)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConnectionError::Read(e)),
        }
    }

    Ok((Drain::Limit, drained))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;

    enum Step {
        Data(&'static [u8]),
        Eof,
        Fail(io::ErrorKind),
    }

    /// In-memory socket. Reads replay `script` and would-block once it runs
    /// dry; writes are captured.
    #[derive(Default)]
    struct Scripted {
        script: VecDeque<Step>,
        eof: bool,
        written: Vec<u8>,
        write_shut: Cell<bool>,
    }

    impl Scripted {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                script: steps.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.eof {
                return Ok(0);
            }
            match self.script.pop_front() {
                Some(Step::Data(data)) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                Some(Step::Eof) => {
                    self.eof = true;
                    Ok(0)
                }
                Some(Step::Fail(kind)) => Err(kind.into()),
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl HalfClose for Scripted {
        fn shutdown_write(&self) -> io::Result<()> {
            self.write_shut.set(true);
            Ok(())
        }
    }

    struct TempRoot(PathBuf);

    impl TempRoot {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("lantern-conn-{}-{}", std::process::id(), name));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("index.html"), "hello").unwrap();
            Self(dir)
        }

        fn root(&self) -> DocumentRoot {
            DocumentRoot::new(&self.0)
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn conn(steps: impl IntoIterator<Item = Step>) -> Connection<Scripted> {
        Connection::new(Scripted::new(steps), "127.0.0.1:4000".parse().unwrap())
    }

    #[test]
    fn serves_file_in_one_event() {
        let tmp = TempRoot::new("one-event");
        let root = tmp.root();
        let mut c = conn([Step::Data(b"GET /index.html HTTP/1.1\r\n\r\n")]);

        // Response out and write half shut; waiting on the peer to close.
        assert_eq!(c.advance(&root).unwrap(), Outcome::Wait(Interest::READABLE));
        assert_eq!(
            c.stream_mut().written,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\nhello"
        );
        assert!(c.stream_mut().write_shut.get());

        c.stream_mut().script.push_back(Step::Eof);
        assert_eq!(c.advance(&root).unwrap(), Outcome::Close);
    }

    #[test]
    fn partial_request_line_waits_for_more() {
        let tmp = TempRoot::new("partial");
        let root = tmp.root();
        let mut c = conn([Step::Data(b"GET /inde")]);

        assert_eq!(c.advance(&root).unwrap(), Outcome::Wait(Interest::READABLE));
        assert!(c.stream_mut().written.is_empty());

        c.stream_mut().script.push_back(Step::Data(b"x.html HTTP/1.1\r\n\r\n"));
        c.stream_mut().script.push_back(Step::Eof);
        assert_eq!(c.advance(&root).unwrap(), Outcome::Close);
        assert!(c.stream_mut().written.starts_with(b"HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn peer_close_without_data_is_not_an_error() {
        let tmp = TempRoot::new("eof");
        let mut c = conn([Step::Eof]);

        assert_eq!(c.advance(&tmp.root()).unwrap(), Outcome::Close);
        assert!(c.stream_mut().written.is_empty());
    }

    #[test]
    fn half_closed_peer_gets_response_for_unterminated_line() {
        let tmp = TempRoot::new("half-close");
        let mut c = conn([Step::Data(b"GET /missing.html"), Step::Eof]);

        assert_eq!(c.advance(&tmp.root()).unwrap(), Outcome::Close);
        assert_eq!(
            c.stream_mut().written,
            b"HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\n\r\n"
        );
    }

    #[test]
    fn missing_slash_sends_nothing() {
        let tmp = TempRoot::new("no-slash");
        let mut c = conn([Step::Data(b"GARBAGE\r\n\r\n")]);

        let err = c.advance(&tmp.root()).unwrap_err();
        assert!(matches!(err, ConnectionError::Parse(ParseError::MissingUri)));
        assert!(c.stream_mut().written.is_empty());

        assert_eq!(c.on_ready(&tmp.root()), Outcome::Close);
    }

    #[test]
    fn recv_error_fails_connection() {
        let tmp = TempRoot::new("recv-error");
        let mut c = conn([Step::Fail(io::ErrorKind::ConnectionReset)]);

        assert!(matches!(c.advance(&tmp.root()), Err(ConnectionError::Read(_))));
    }

    #[test]
    fn interrupted_read_is_retried() {
        let tmp = TempRoot::new("eintr");
        let mut c = conn([
            Step::Fail(io::ErrorKind::Interrupted),
            Step::Data(b"GET /index.html HTTP/1.1\r\n\r\n"),
            Step::Eof,
        ]);

        assert_eq!(c.advance(&tmp.root()).unwrap(), Outcome::Close);
        assert!(c.stream_mut().written.ends_with(b"hello"));
    }

    #[test]
    fn overlong_request_line_is_rejected() {
        let tmp = TempRoot::new("too-long");
        let chunk: &'static [u8] = &[b'a'; 600];
        let mut c = conn([Step::Data(chunk), Step::Data(chunk)]);

        let err = c.advance(&tmp.root()).unwrap_err();
        assert!(matches!(err, ConnectionError::Parse(ParseError::RequestLineTooLong)));
        assert!(c.stream_mut().written.is_empty());
    }

    #[test]
    fn trailing_input_is_drained_before_close() {
        let tmp = TempRoot::new("trailing");
        let root = tmp.root();
        let filler: &'static [u8] = &[b'x'; READ_CHUNK];

        let mut steps = vec![Step::Data(b"GET /index.html HTTP/1.1\r\n\r\n")];
        steps.extend((0..200).map(|_| Step::Data(filler)));
        let mut c = conn(steps);

        // The first event stops at the drain limit with input still queued.
        let first = c.advance(&root).unwrap();
        assert!(matches!(first, Outcome::Rearm(_)), "{:?}", first);
        assert!(c.stream_mut().written.ends_with(b"hello"));

        let mut outcome = first;
        for _ in 0..10 {
            if outcome == Outcome::Wait(Interest::READABLE) {
                break;
            }
            outcome = c.advance(&root).unwrap();
        }
        assert_eq!(outcome, Outcome::Wait(Interest::READABLE));
        assert!(c.stream_mut().script.is_empty());

        c.stream_mut().script.push_back(Step::Eof);
        assert_eq!(c.advance(&root).unwrap(), Outcome::Close);
    }

    #[test]
    fn lingering_gives_up_on_endless_input() {
        let tmp = TempRoot::new("endless");
        let root = tmp.root();
        let filler: &'static [u8] = &[b'x'; READ_CHUNK];

        let mut steps = vec![Step::Data(b"GET /index.html HTTP/1.1\r\n\r\n")];
        steps.extend((0..(LINGER_LIMIT / READ_CHUNK) + 200).map(|_| Step::Data(filler)));
        let mut c = conn(steps);

        let mut outcome = c.advance(&root).unwrap();
        for _ in 0..100 {
            if outcome == Outcome::Close {
                break;
            }
            outcome = c.advance(&root).unwrap();
        }
        assert_eq!(outcome, Outcome::Close);
        assert!(c.stream_mut().written.ends_with(b"hello"));
    }
}
