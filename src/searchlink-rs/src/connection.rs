use searchlink_core::{Body, ErrorBody, RequestArgs};
use serde_json::Value;
use std::sync::Arc;

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError, Verb};

/// Paths this deep are probed with GET; some resources don't answer HEAD
const EXISTS_GET_DEPTH: usize = 3;

/// Outcome of a single failed attempt against one node
#[derive(Debug)]
pub enum Failure {
    /// No interpretable HTTP response; the node may be down
    Transport(TransportError),
    /// The node answered with a non-2xx status
    Application(HttpError),
    /// Rejected before anything was sent
    InvalidBody(String),
}

impl From<TransportError> for Failure {
    fn from(error: TransportError) -> Self {
        Failure::Transport(error)
    }
}

/// Non-2xx response from a node
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub host: String,
    pub status: u16,
    pub message: String,
    pub raw_body: String,
    pub body: ErrorBody,
}

impl HttpError {
    fn from_response(host: &str, response: HttpResponse) -> Self {
        let mut message = format!(
            "Error performing HTTP request to {}: {} {}",
            host, response.status, response.reason
        );
        if !response.body.is_empty() {
            message.push_str("\nBody: ");
            message.push_str(&response.body);
        }

        Self {
            host: host.to_string(),
            status: response.status,
            message,
            body: ErrorBody::from_raw(&response.body),
            raw_body: response.body,
        }
    }

    /// Body decoded as JSON, if it is JSON
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.raw_body).ok()
    }
}

/// Verb-level access to a single node
pub struct Connection {
    transport: Arc<dyn Transport>,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn host(&self) -> &str {
        self.transport.host()
    }

    pub fn get(&self, path: &str, args: &RequestArgs) -> Result<Value, Failure> {
        self.request(Verb::Get, path, args)
    }

    pub fn post(&self, path: &str, args: &RequestArgs) -> Result<Value, Failure> {
        self.request(Verb::Post, path, args)
    }

    pub fn put(&self, path: &str, args: &RequestArgs) -> Result<Value, Failure> {
        self.request(Verb::Put, path, args)
    }

    pub fn delete(&self, path: &str, args: &RequestArgs) -> Result<Value, Failure> {
        self.request(Verb::Delete, path, args)
    }

    /// HEAD request; returns the 2xx status code
    pub fn head(&self, path: &str, args: &RequestArgs) -> Result<u16, Failure> {
        let args = RequestArgs::new().with_query(args.query.clone());
        self.call(Verb::Head, path, &args).map(|r| r.status)
    }

    /// Existence probe. A 404 answers `false` instead of failing.
    pub fn exists(&self, path: &str, args: &RequestArgs) -> Result<bool, Failure> {
        let probe = if path_depth(path) >= EXISTS_GET_DEPTH {
            self.call(Verb::Get, path, args).map(|_| true)
        } else {
            self.head(path, args).map(|status| status == 200)
        };

        match probe {
            Err(Failure::Application(error)) if error.status == 404 => Ok(false),
            other => other,
        }
    }

    pub fn reset(&self) {
        self.transport.reset();
    }

    fn request(&self, verb: Verb, path: &str, args: &RequestArgs) -> Result<Value, Failure> {
        let response = self.call(verb, path, args)?;

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response.body).map_err(|source| {
            Failure::Transport(TransportError::Malformed {
                host: self.host().to_string(),
                source,
            })
        })
    }

    /// Send the request and turn non-2xx statuses into `Failure::Application`
    fn call(&self, verb: Verb, path: &str, args: &RequestArgs) -> Result<HttpResponse, Failure> {
        let request = HttpRequest {
            verb,
            url: self.url_for(path),
            query: args.query.clone(),
            body: encode_body(args.body.as_ref())?,
        };

        tracing::debug!(host = %self.host(), verb = %verb, url = %request.url, "Sending request");
        let response = self.transport.send(&request)?;

        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(Failure::Application(HttpError::from_response(
                self.host(),
                response,
            )))
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.host(), path)
        } else {
            format!("{}/{}", self.host(), path)
        }
    }
}

fn encode_body(body: Option<&Body>) -> Result<Option<String>, Failure> {
    match body {
        None => Ok(None),
        Some(Body::Raw(raw)) => Ok(Some(raw.clone())),
        Some(Body::Json(value @ Value::Object(_))) => Ok(Some(value.to_string())),
        Some(Body::Json(other)) => Err(Failure::InvalidBody(format!(
            "expected a JSON object or a string, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a JSON string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn path_depth(path: &str) -> usize {
    path.matches('/').count()
}
