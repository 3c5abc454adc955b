// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    std::error::Error as StdError,
    thiserror::Error,
};

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum RpmRepositoryError {
    #[error("URL parse error: {0:?}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0:?}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request to {0} failed: {1:?}")]
    HttpRequest(String, reqwest::Error),

    #[error("unexpected HTTP status {1} for {0}")]
    HttpStatus(String, reqwest::StatusCode),

    #[error("XML error: {0:?}")]
    Xml(#[from] serde_xml_rs::Error),

    #[error("XML read error: {0}")]
    XmlRead(#[from] xml::reader::Error),

    #[error("repository I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("repository metadata entry not found: {0}")]
    MetadataFileNotFound(&'static str),

    #[error("unsupported database format: {0}")]
    UnsupportedDatabaseFormat(String),

    #[error("URL has no repodata segment: {0}")]
    NoRepodataSegment(String),

    #[error("URL cannot be a base: {0}")]
    CannotBeABase(String),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, RpmRepositoryError>;

/// Kinds of transport failure that are worth retrying.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransientKind {
    /// The peer reset the connection.
    ConnectionReset,
    /// Establishing the connection timed out.
    ConnectionTimeout,
    /// The request as a whole ran past its deadline.
    Deadline,
}

impl RpmRepositoryError {
    /// Classify this error as a transient transport condition, if it is one.
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            Self::Http(e) | Self::HttpRequest(_, e) => transient_kind_of_http(e),
            Self::IoPath(_, e) => transient_kind_of_io(e),
            _ => None,
        }
    }

    /// Whether this error was caused by a connection reset.
    pub fn is_connection_reset(&self) -> bool {
        self.transient_kind() == Some(TransientKind::ConnectionReset)
    }
}

fn transient_kind_of_io(e: &std::io::Error) -> Option<TransientKind> {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset => Some(TransientKind::ConnectionReset),
        std::io::ErrorKind::TimedOut => Some(TransientKind::ConnectionTimeout),
        _ => None,
    }
}

pub(crate) fn transient_kind_of_http(e: &reqwest::Error) -> Option<TransientKind> {
    // The reset surfaces as an io::Error somewhere down the hyper source chain.
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if let Some(kind) = transient_kind_of_io(io) {
                return Some(kind);
            }
        }
        source = err.source();
    }

    if e.is_timeout() {
        if e.is_connect() {
            Some(TransientKind::ConnectionTimeout)
        } else {
            Some(TransientKind::Deadline)
        }
    } else {
        None
    }
}
