use std::fs::File;
use std::io::{self, Read, Write};

use crate::http::error::ConnectionError;
use crate::http::response::{Body, Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Size of each file read while streaming a body.
pub const CHUNK_SIZE: usize = 1024;

/// Status line, headers, and the blank separator line for `resp`.
pub fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Everything has been handed to the socket.
    Complete,
    /// The socket stopped accepting bytes; call again once it is writable.
    Blocked,
}

/// Resumable writer for one response.
///
/// Tracks how much of the head and of the current body chunk has been sent,
/// so a would-block in the middle of either picks up at the same byte on the
/// next writable event.
pub struct ResponseWriter {
    status: StatusCode,
    head: Vec<u8>,
    written: usize,
    body: Option<File>,
    chunk: Vec<u8>,
    chunk_len: usize,
    chunk_sent: usize,
    body_bytes: u64,
}

impl ResponseWriter {
    pub fn new(response: Response) -> Self {
        let head = serialize_head(&response);
        let body = match response.body {
            Body::Empty => None,
            Body::File(file) => Some(file),
        };

        Self {
            status: response.status,
            head,
            written: 0,
            body,
            chunk: vec![0u8; CHUNK_SIZE],
            chunk_len: 0,
            chunk_sent: 0,
            body_bytes: 0,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body bytes sent so far.
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes
    }

    /// Writes as much of the response as `out` accepts without blocking.
    ///
    /// Any send error, or a file read error mid-body, aborts the transfer;
    /// there is no way to resume after an `Err`.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> Result<WriteStatus, ConnectionError> {
        while self.written < self.head.len() {
            match send(out, &self.head[self.written..])? {
                Some(n) => self.written += n,
                None => return Ok(WriteStatus::Blocked),
            }
        }

        loop {
            while self.chunk_sent < self.chunk_len {
                match send(out, &self.chunk[self.chunk_sent..self.chunk_len])? {
                    Some(n) => {
                        self.chunk_sent += n;
                        self.body_bytes += n as u64;
                    }
                    None => return Ok(WriteStatus::Blocked),
                }
            }

            let Some(file) = self.body.as_mut() else {
                return Ok(WriteStatus::Complete);
            };

            let n = loop {
                match file.read(&mut self.chunk) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(ConnectionError::FileRead(e)),
                }
            };

            if n == 0 {
                // EOF: dropping the handle closes the file.
                self.body = None;
                return Ok(WriteStatus::Complete);
            }

            self.chunk_len = n;
            self.chunk_sent = 0;
        }
    }
}

/// One non-blocking send. `None` means the socket would block.
fn send<W: Write>(out: &mut W, buf: &[u8]) -> Result<Option<usize>, ConnectionError> {
    loop {
        match out.write(buf) {
            Ok(0) => return Err(ConnectionError::SendClosed),
            Ok(n) => return Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConnectionError::Send(e)),
        }
    }
}
