/// The part of a client request the server acts on.
///
/// Only the request target of the first line is kept. Method, version, and
/// headers are read off the socket but never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The request target as sent, starting with `/` (e.g. "/index.html")
    pub path: String,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Whether the target contains a `..` sequence anywhere.
    pub fn is_suspicious(&self) -> bool {
        self.path.contains("..")
    }
}
