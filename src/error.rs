//! Errors raised while serving a single client connection.
//!
//! None of these are fatal to the server. The worker that hits one answers
//! with an error page when nothing has been sent to the client yet, then
//! closes its own connection.

use std::io;

use crate::http::parser::ParseError;
use crate::http::response::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("bad request: {0}")]
    Parse(#[from] ParseError),

    #[error("client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    #[error("failed to connect to origin {authority}: {source}")]
    OriginConnect {
        authority: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to origin {authority}")]
    ConnectTimeout { authority: String },

    /// The origin failed after `relayed` bytes had already gone to the client.
    #[error("origin stream failed after {relayed} bytes: {source}")]
    OriginStream {
        relayed: u64,
        #[source]
        source: io::Error,
    },
}

impl ProxyError {
    /// Status to report to the client, or `None` when the client can no
    /// longer be answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProxyError::Parse(_) => Some(StatusCode::BadRequest),
            ProxyError::OriginConnect { .. } => Some(StatusCode::BadGateway),
            ProxyError::ConnectTimeout { .. } => Some(StatusCode::GatewayTimeout),
            ProxyError::OriginStream { relayed: 0, .. } => Some(StatusCode::BadGateway),
            ProxyError::OriginStream { .. } | ProxyError::ClientIo(_) => None,
        }
    }

    /// Longer explanation shown in the error page.
    pub fn description(&self) -> &'static str {
        match self {
            ProxyError::Parse(_) => "The proxy could not understand the request",
            ProxyError::OriginConnect { .. } => "The proxy could not reach the origin server",
            ProxyError::ConnectTimeout { .. } => "The origin server did not accept the connection in time",
            ProxyError::OriginStream { .. } => "The origin server closed the connection unexpectedly",
            ProxyError::ClientIo(_) => "The client connection failed",
        }
    }
}
