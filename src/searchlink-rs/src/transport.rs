//! Transport adapters: one HTTP library call per verb against one base URL

use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use searchlink_core::{ConnectionConfig, QueryString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
            Verb::Head => Method::HEAD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub verb: Verb,
    pub url: String,
    pub query: QueryString,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

/// A request that never produced an interpretable HTTP response
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection refused to {host}")]
    ConnectionRefused { host: String },

    #[error("Connection timed out to {host}")]
    ConnectTimeout { host: String },

    #[error("Request send timed out to {host}")]
    SendTimeout { host: String },

    #[error("Receive timed out from {host}")]
    ReceiveTimeout { host: String },

    #[error("Malformed response from {host}: {source}")]
    Malformed {
        host: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unhandled error within connection to {host}: {source}")]
    Unhandled {
        host: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TransportError {
    pub fn host(&self) -> &str {
        match self {
            TransportError::ConnectionRefused { host }
            | TransportError::ConnectTimeout { host }
            | TransportError::SendTimeout { host }
            | TransportError::ReceiveTimeout { host }
            | TransportError::Malformed { host, .. }
            | TransportError::Unhandled { host, .. } => host,
        }
    }
}

/// Sends raw HTTP requests to a single node
pub trait Transport: Send + Sync {
    /// Base URL of the node, without a trailing slash
    fn host(&self) -> &str;

    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;

    /// Drop any pooled sockets
    fn reset(&self);
}

/// `reqwest` blocking transport
pub struct HttpTransport {
    host: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    http: Mutex<HttpClient>,
}

enum Phase {
    Send,
    Receive,
}

impl HttpTransport {
    pub fn new(host: impl Into<String>, config: &ConnectionConfig) -> Result<Self> {
        let host = host.into().trim_end_matches('/').to_string();
        let connect_timeout = config.connect_timeout();
        // reqwest has a single deadline covering both directions
        let request_timeout = config.send_timeout() + config.receive_timeout();

        let http = build_http_client(connect_timeout, request_timeout).map_err(|source| {
            ClientError::TransportInit {
                host: host.clone(),
                source,
            }
        })?;

        Ok(Self {
            host,
            connect_timeout,
            request_timeout,
            http: Mutex::new(http),
        })
    }

    fn classify(&self, error: reqwest::Error, phase: Phase) -> TransportError {
        let host = self.host.clone();

        if error.is_timeout() {
            if error.is_connect() {
                return TransportError::ConnectTimeout { host };
            }
            return match phase {
                Phase::Send => TransportError::SendTimeout { host },
                Phase::Receive => TransportError::ReceiveTimeout { host },
            };
        }

        if is_connection_refused(&error) {
            return TransportError::ConnectionRefused { host };
        }

        TransportError::Unhandled {
            host,
            source: Box::new(error),
        }
    }
}

impl Transport for HttpTransport {
    fn host(&self) -> &str {
        &self.host
    }

    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let http = self.http.lock().clone();

        let mut builder = http.request(request.verb.into(), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| self.classify(e, Phase::Send))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| self.classify(e, Phase::Receive))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }

    fn reset(&self) {
        match build_http_client(self.connect_timeout, self.request_timeout) {
            Ok(fresh) => {
                *self.http.lock() = fresh;
                tracing::info!(host = %self.host, "HTTP transport reset");
            }
            Err(e) => tracing::warn!(host = %self.host, "Failed to rebuild HTTP client: {}", e),
        }
    }
}

fn build_http_client(connect_timeout: Duration, timeout: Duration) -> reqwest::Result<HttpClient> {
    // nodes are always addressed directly
    HttpClient::builder()
        .no_proxy()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
}

fn is_connection_refused(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Builds a transport for a node URL
pub trait TransportFactory: Send + Sync {
    fn build(&self, url: &Url, config: &ConnectionConfig) -> Result<Arc<dyn Transport>>;
}

/// Factory for `http` and `https` nodes. Only scheme, host and port of the
/// node URL are kept.
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn build(&self, url: &Url, config: &ConnectionConfig) -> Result<Arc<dyn Transport>> {
        let base = url.origin().ascii_serialization();
        Ok(Arc::new(HttpTransport::new(base, config)?))
    }
}

type InitHook = Arc<dyn Fn(&dyn Transport) + Send + Sync>;

/// Maps URL schemes to transport factories
#[derive(Clone)]
pub struct TransportRegistry {
    factories: HashMap<String, Arc<dyn TransportFactory>>,
    init_hook: Option<InitHook>,
}

impl TransportRegistry {
    /// Registry with no schemes registered
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            init_hook: None,
        }
    }

    pub fn register(
        mut self,
        scheme: impl Into<String>,
        factory: impl TransportFactory + 'static,
    ) -> Self {
        self.factories.insert(scheme.into(), Arc::new(factory));
        self
    }

    /// Hook invoked with every freshly built transport
    pub fn on_transport(mut self, hook: impl Fn(&dyn Transport) + Send + Sync + 'static) -> Self {
        self.init_hook = Some(Arc::new(hook));
        self
    }

    pub fn transport_for(&self, host: &str, config: &ConnectionConfig) -> Result<Arc<dyn Transport>> {
        let url = Url::parse(host).map_err(|e| ClientError::InvalidHost {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

        let factory = self
            .factories
            .get(url.scheme())
            .ok_or_else(|| ClientError::TransportNotFound(url.scheme().to_string()))?;

        let transport = factory.build(&url, config)?;
        if let Some(hook) = &self.init_hook {
            hook(transport.as_ref());
        }

        Ok(transport)
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::empty()
            .register("http", HttpTransportFactory)
            .register("https", HttpTransportFactory)
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<&String> = self.factories.keys().collect();
        schemes.sort();
        f.debug_struct("TransportRegistry")
            .field("schemes", &schemes)
            .field("init_hook", &self.init_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });

        (format!("http://{}", addr), handle)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let header_end = loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        String::from_utf8(buf).unwrap()
    }

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig {
            timeout: 0.2,
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn test_http_transport_sends_query_and_body() {
        let (host, server) = serve_once(
            "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}",
        );
        let transport = HttpTransport::new(format!("{}/", host), &fast_config()).unwrap();
        assert_eq!(transport.host(), host);

        let mut query = QueryString::new();
        query.insert("refresh".into(), "true".into());
        let response = transport
            .send(&HttpRequest {
                verb: Verb::Post,
                url: format!("{}/docs/doc/1", host),
                query,
                body: Some("{\"foo\":\"bar\"}".into()),
            })
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.reason, "Created");
        assert_eq!(response.body, "{\"ok\":true}");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /docs/doc/1?refresh=true HTTP/1.1\r\n"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with("{\"foo\":\"bar\"}"));
    }

    #[test]
    fn test_http_transport_returns_error_statuses_as_responses() {
        let (host, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"found\":false}",
        );
        let transport = HttpTransport::new(host.clone(), &fast_config()).unwrap();

        let response = transport
            .send(&HttpRequest {
                verb: Verb::Get,
                url: format!("{}/docs/doc/missing", host),
                query: QueryString::new(),
                body: None,
            })
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert_eq!(response.body, "{\"found\":false}");
        server.join().unwrap();
    }

    #[test]
    fn test_http_transport_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let transport = HttpTransport::new(host.clone(), &fast_config()).unwrap();
        let error = transport
            .send(&HttpRequest {
                verb: Verb::Get,
                url: format!("{}/", host),
                query: QueryString::new(),
                body: None,
            })
            .unwrap_err();

        assert!(matches!(error, TransportError::ConnectionRefused { .. }), "{:?}", error);
        assert_eq!(error.host(), host);
        assert_eq!(error.to_string(), format!("Connection refused to {}", host));
    }

    #[test]
    fn test_http_transport_times_out_waiting_for_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(1500));
            drop(stream);
        });

        let config = ConnectionConfig {
            timeout: 0.1,
            connect_timeout: Some(1.0),
            ..ConnectionConfig::default()
        };
        let transport = HttpTransport::new(host.clone(), &config).unwrap();
        let error = transport
            .send(&HttpRequest {
                verb: Verb::Get,
                url: format!("{}/slow", host),
                query: QueryString::new(),
                body: None,
            })
            .unwrap_err();

        assert!(matches!(error, TransportError::SendTimeout { .. }), "{:?}", error);
        server.join().unwrap();
    }

    #[test]
    fn test_http_transport_times_out_reading_body() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            // headers promise more body than is ever sent
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 20\r\n\r\n{\"ok\"")
                .unwrap();
            stream.flush().unwrap();
            thread::sleep(Duration::from_millis(1500));
        });

        let config = ConnectionConfig {
            timeout: 0.1,
            connect_timeout: Some(1.0),
            ..ConnectionConfig::default()
        };
        let transport = HttpTransport::new(host.clone(), &config).unwrap();
        let error = transport
            .send(&HttpRequest {
                verb: Verb::Get,
                url: format!("{}/stalled", host),
                query: QueryString::new(),
                body: None,
            })
            .unwrap_err();

        assert!(matches!(error, TransportError::ReceiveTimeout { .. }), "{:?}", error);
        assert_eq!(error.to_string(), format!("Receive timed out from {}", host));
        server.join().unwrap();
    }

    #[test]
    fn test_http_transport_garbage_response_is_unhandled() {
        let (host, server) = serve_once("not http at all\r\n\r\n");
        let transport = HttpTransport::new(host.clone(), &fast_config()).unwrap();

        let error = transport
            .send(&HttpRequest {
                verb: Verb::Get,
                url: format!("{}/", host),
                query: QueryString::new(),
                body: None,
            })
            .unwrap_err();

        assert!(matches!(error, TransportError::Unhandled { .. }), "{:?}", error);
        assert!(error
            .to_string()
            .starts_with(&format!("Unhandled error within connection to {}: ", host)));
        assert!(std::error::Error::source(&error).is_some());
        server.join().unwrap();
    }

    #[test]
    fn test_transport_error_messages_name_the_failure() {
        let host = "http://node1:9200".to_string();
        let messages = [
            TransportError::ConnectionRefused { host: host.clone() },
            TransportError::ConnectTimeout { host: host.clone() },
            TransportError::SendTimeout { host: host.clone() },
            TransportError::ReceiveTimeout { host: host.clone() },
        ]
        .map(|error| error.to_string());

        assert_eq!(messages[0], "Connection refused to http://node1:9200");
        assert_eq!(messages[1], "Connection timed out to http://node1:9200");
        assert_eq!(messages[2], "Request send timed out to http://node1:9200");
        assert_eq!(messages[3], "Receive timed out from http://node1:9200");
    }

    #[test]
    fn test_registry_rejects_unknown_scheme() {
        let registry = TransportRegistry::default();
        let error = registry
            .transport_for("thrift://localhost:9500", &ConnectionConfig::default())
            .err()
            .unwrap();

        assert!(matches!(error, ClientError::TransportNotFound(ref s) if s == "thrift"));
    }

    #[test]
    fn test_registry_rejects_invalid_host() {
        let registry = TransportRegistry::default();
        let error = registry
            .transport_for("not a url", &ConnectionConfig::default())
            .err()
            .unwrap();

        assert!(matches!(error, ClientError::InvalidHost { .. }));
    }

    #[test]
    fn test_registry_builds_http_transport_from_origin() {
        let hooked = Arc::new(AtomicUsize::new(0));
        let counter = hooked.clone();
        let registry = TransportRegistry::default().on_transport(move |transport| {
            assert_eq!(transport.host(), "http://localhost:9200");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let transport = registry
            .transport_for("http://localhost:9200/ignored/path", &ConnectionConfig::default())
            .unwrap();

        assert_eq!(transport.host(), "http://localhost:9200");
        assert_eq!(hooked.load(Ordering::SeqCst), 1);
    }
}
