use parking_lot::Mutex;
use reqwest::Url;
use searchlink_core::codec;
use searchlink_core::{
    BulkOperation, ClientConfig, MultiSearchOperation, QueryString, RequestArgs,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::connection::{Connection, Failure};
use crate::cursor::HostCursor;
use crate::transport::TransportRegistry;
use crate::{ClientError, Result};

/// Cluster client with node failover.
///
/// Every operation runs through a retry loop: a transport failure rotates to
/// the next host and repeats the same request, up to `max_retries`
/// consecutive failures. Errors reported by a node (non-2xx responses) are
/// never retried. The active host is sticky across calls.
pub struct Client {
    hosts: Arc<[String]>,
    config: ClientConfig,
    transports: TransportRegistry,
    state: Mutex<ClientState>,
}

struct ClientState {
    cursor: HostCursor,
    connection: Option<Arc<Connection>>,
    retries: u32,
}

impl Client {
    /// Create a client for one or more nodes using the default HTTP transports
    pub fn new<I, S>(hosts: I, config: ClientConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_transports(hosts, config, TransportRegistry::default())
    }

    pub fn with_transports<I, S>(
        hosts: I,
        config: ClientConfig,
        transports: TransportRegistry,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| normalize_host(host.into()))
            .collect::<Result<Vec<_>>>()?;
        let hosts: Arc<[String]> = hosts.into();

        let cursor = HostCursor::new(hosts.clone()).ok_or(ClientError::NoHosts)?;

        Ok(Self {
            hosts,
            config,
            transports,
            state: Mutex::new(ClientState {
                cursor,
                connection: None,
                retries: 0,
            }),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn active_host(&self) -> String {
        self.state.lock().cursor.active().to_string()
    }

    /// Consecutive transport failures since the last completed request
    pub fn retries(&self) -> u32 {
        self.state.lock().retries
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    pub fn get(&self, path: &str, args: &RequestArgs) -> Result<Value> {
        self.with_failover(|conn| conn.get(path, args))
    }

    pub fn post(&self, path: &str, args: &RequestArgs) -> Result<Value> {
        self.with_failover(|conn| conn.post(path, args))
    }

    pub fn put(&self, path: &str, args: &RequestArgs) -> Result<Value> {
        self.with_failover(|conn| conn.put(path, args))
    }

    pub fn delete(&self, path: &str, args: &RequestArgs) -> Result<Value> {
        self.with_failover(|conn| conn.delete(path, args))
    }

    /// Submit write operations in one `_bulk` request.
    ///
    /// An empty operation list returns an empty array without touching the
    /// network.
    pub fn bulk(
        &self,
        path: &str,
        operations: &[BulkOperation],
        query: &QueryString,
    ) -> Result<Value> {
        if operations.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        let path = codec::rewrite_path_for_bulk(path);
        let args = RequestArgs::new()
            .with_query(query.clone())
            .raw(codec::encode_bulk(operations));

        self.with_failover(|conn| conn.post(&path, &args))
    }

    /// Submit several searches in one `_msearch` request
    pub fn multi_search(
        &self,
        path: &str,
        operations: &[MultiSearchOperation],
        query: &QueryString,
    ) -> Result<Value> {
        let path = codec::rewrite_path_for_multi_search(path);
        let args = RequestArgs::new()
            .with_query(query.clone())
            .raw(codec::encode_multi_search(operations));

        self.with_failover(|conn| conn.get(&path, &args))
    }

    pub fn exists(&self, path: &str, args: &RequestArgs) -> Result<bool> {
        self.with_failover(|conn| conn.exists(path, args))
    }

    /// Drop pooled sockets of the live connection. Host rotation is untouched.
    pub fn reset(&self) {
        let connection = self.state.lock().connection.clone();
        if let Some(connection) = connection {
            connection.reset();
        }
    }

    /// Live connection for the active host, built on first use
    fn connection(&self) -> Result<Arc<Connection>> {
        let mut state = self.state.lock();
        if let Some(connection) = &state.connection {
            return Ok(connection.clone());
        }

        let host = state.cursor.active().to_string();
        let transport = self
            .transports
            .transport_for(&host, &self.config.connection)?;
        debug!(host = %host, "Opened connection");

        let connection = Arc::new(Connection::new(transport));
        state.connection = Some(connection.clone());
        Ok(connection)
    }

    fn with_failover<T, F>(&self, operation: F) -> Result<T>
    where
        F: Fn(&Connection) -> std::result::Result<T, Failure>,
    {
        loop {
            let connection = self.connection()?;

            let failure = match operation(connection.as_ref()) {
                Ok(value) => {
                    self.state.lock().retries = 0;
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            match failure {
                Failure::Transport(transport_error) => {
                    let mut state = self.state.lock();
                    if state.retries >= self.config.max_retries {
                        error!(
                            host = %connection.host(),
                            retries = state.retries,
                            "Giving up after repeated transport failures: {}",
                            transport_error
                        );
                        return Err(transport_error.into());
                    }

                    state.retries += 1;
                    let still_live = state
                        .connection
                        .as_ref()
                        .is_some_and(|live| Arc::ptr_eq(live, &connection));
                    // another thread may already have moved on from this host
                    if still_live {
                        let next = state.cursor.advance().to_string();
                        state.connection = None;
                        warn!(
                            failed = %connection.host(),
                            next = %next,
                            attempt = state.retries,
                            "Transport failure, failing over: {}",
                            transport_error
                        );
                    }
                }
                Failure::Application(http_error) => {
                    self.state.lock().retries = 0;
                    return Err(http_error.into());
                }
                Failure::InvalidBody(message) => {
                    return Err(ClientError::InvalidBody(message));
                }
            }
        }
    }
}

fn normalize_host(host: String) -> Result<String> {
    let trimmed = host.trim_end_matches('/');
    Url::parse(trimmed).map_err(|e| ClientError::InvalidHost {
        host: host.clone(),
        reason: e.to_string(),
    })?;
    Ok(trimmed.to_string())
}
