//! Searchlink Client Library
//!
//! Blocking HTTP client for Elasticsearch-compatible clusters with node
//! failover and bounded retries.

mod client;
mod connection;
mod cursor;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::Client;
pub use connection::{Connection, Failure, HttpError};
pub use cursor::HostCursor;
pub use searchlink_core::{
    BulkAction, BulkOperation, ClientConfig, ConnectionConfig, MultiSearchOperation, QueryString,
    RemoteError, RequestArgs,
};
pub use transport::{
    HttpTransport, Transport, TransportError, TransportFactory, TransportRegistry,
};

use searchlink_core::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Exhausted transport retries, or a non-2xx response without a
    /// service-reported error
    #[error("{message}")]
    Request {
        host: String,
        status: Option<u16>,
        body: Option<String>,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{error} (status {status} from {host})")]
    Remote {
        host: String,
        status: u16,
        #[source]
        error: RemoteError,
    },

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("At least one host is required")]
    NoHosts,

    #[error("Invalid host URL {host}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("No transport found for scheme {0}")]
    TransportNotFound(String),

    #[error("Failed to initialise transport for {host}: {source}")]
    TransportInit {
        host: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// HTTP status reported by the remote node, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => *status,
            ClientError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            ClientError::Request { host, .. }
            | ClientError::Remote { host, .. }
            | ClientError::InvalidHost { host, .. }
            | ClientError::TransportInit { host, .. } => Some(host),
            _ => None,
        }
    }

    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ClientError::Remote { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<HttpError> for ClientError {
    fn from(error: HttpError) -> Self {
        match error.body {
            ErrorBody::Remote(message) => ClientError::Remote {
                host: error.host,
                status: error.status,
                error: RemoteError::parse(message),
            },
            ErrorBody::Other(raw) => ClientError::Request {
                host: error.host,
                status: Some(error.status),
                body: (!raw.is_empty()).then_some(raw),
                message: error.message,
                source: None,
            },
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(error: TransportError) -> Self {
        ClientError::Request {
            host: error.host().to_string(),
            status: None,
            body: None,
            message: error.to_string(),
            source: Some(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
