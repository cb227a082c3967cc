use std::io;

use thiserror::Error;

use crate::http::parser::ParseError;

/// Why a single connection was abandoned.
///
/// These never leave the connection: the handler logs them and the event
/// loop only learns that the connection is finished.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("recv failed: {0}")]
    Read(#[source] io::Error),

    #[error("bad request: {0}")]
    Parse(#[from] ParseError),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("peer stopped accepting data")]
    SendClosed,

    #[error("file read failed: {0}")]
    FileRead(#[source] io::Error),
}
