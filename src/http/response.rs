use std::fs::File;

/// HTTP status codes the server can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "Not Found",
        }
    }
}

/// Response payload.
#[derive(Debug)]
pub enum Body {
    Empty,
    /// Streamed from disk in fixed-size chunks, never buffered whole.
    File(File),
}

/// A response ready to be written to a client.
///
/// Every response carries the same single header, `Content-Type: text/html`,
/// in a fixed order so the bytes on the wire are fully determined by the
/// status.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Body,
}

impl Response {
    /// 200 OK streaming the contents of `file`.
    pub fn ok(file: File) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: default_headers(),
            body: Body::File(file),
        }
    }

    /// 404 Not Found with an empty body.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NotFound,
            headers: default_headers(),
            body: Body::Empty,
        }
    }
}

fn default_headers() -> Vec<(&'static str, &'static str)> {
    vec![("Content-Type", "text/html")]
}
