use thiserror::Error;

use crate::http::request::Request;

/// Largest request line the server will hold for one connection.
pub const MAX_REQUEST_LINE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request line is not complete yet")]
    Incomplete,
    #[error("no '/' in request line")]
    MissingUri,
    #[error("request target is not valid UTF-8")]
    InvalidUri,
    #[error("request line exceeds {} bytes", MAX_REQUEST_LINE)]
    RequestLineTooLong,
}

/// Extracts the request target from the first line in `buf`.
///
/// Returns `Incomplete` until a `\n` has arrived, or `RequestLineTooLong` once
/// `MAX_REQUEST_LINE` bytes have arrived without one.
pub fn parse_http_request(buf: &[u8]) -> Result<Request, ParseError> {
    match find_line_end(buf) {
        Some(end) => parse_request_line(&buf[..end]),
        None if buf.len() >= MAX_REQUEST_LINE => Err(ParseError::RequestLineTooLong),
        None => Err(ParseError::Incomplete),
    }
}

/// Extracts the request target from a single line.
///
/// The target starts at the first `/` and runs up to the next whitespace or
/// the end of the line.
pub fn parse_request_line(line: &[u8]) -> Result<Request, ParseError> {
    let start = line
        .iter()
        .position(|&b| b == b'/')
        .ok_or(ParseError::MissingUri)?;

    let rest = &line[start..];
    let len = rest
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(rest.len());

    let path = std::str::from_utf8(&rest[..len]).map_err(|_| ParseError::InvalidUri)?;

    Ok(Request::new(path))
}

fn find_line_end(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}
