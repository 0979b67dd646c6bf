use std::io;

use thiserror::Error;

/// Failure to turn bytes into an [`HttpRequest`](crate::HttpRequest).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("request is incomplete")]
    Incomplete,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("malformed header line")]
    MalformedHeader,
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),
    #[error("invalid Content-Length value: '{0}'")]
    InvalidContentLength(String),
    #[error("unsupported Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),
    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
    #[error("request body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },
}

impl ParseError {
    /// Status code sent back to the client for this error.
    pub fn status(&self) -> u16 {
        match self {
            ParseError::Incomplete
            | ParseError::MalformedRequestLine
            | ParseError::MalformedHeader
            | ParseError::InvalidContentLength(_) => 400,
            ParseError::UnknownMethod(_) | ParseError::UnsupportedTransferEncoding(_) => 501,
            ParseError::UnsupportedVersion(_) => 505,
            ParseError::HeadTooLarge { .. } => 431,
            ParseError::BodyTooLarge { .. } => 413,
        }
    }
}

/// Rejected route pattern.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route pattern must start with '/': '{0}'")]
    MissingLeadingSlash(String),
    #[error("route pattern has a parameter without a name: '{0}'")]
    EmptyParamName(String),
    #[error("route pattern has a duplicate parameter name '{name}': '{pattern}'")]
    DuplicateParamName { pattern: String, name: String },
    #[error("'*' is only allowed as the last segment: '{0}'")]
    MisplacedWildcard(String),
}

/// Failure to start listening.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to get local address")]
    LocalAddr(#[source] io::Error),
}
