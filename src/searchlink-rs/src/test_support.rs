//! Scripted in-memory cluster used by the connection and client tests

use parking_lot::Mutex;
use reqwest::Url;
use searchlink_core::ConnectionConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError, TransportFactory};
use crate::{Result, TransportRegistry};

#[derive(Debug, Clone)]
pub enum Script {
    Refuse,
    Respond(u16, String),
}

pub fn respond(status: u16, body: &str) -> Script {
    Script::Respond(status, body.to_string())
}

#[derive(Debug, Clone)]
pub struct Call {
    pub host: String,
    pub request: HttpRequest,
}

/// Shared state behind every scripted transport
#[derive(Default)]
pub struct Cluster {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Call>>,
    built: AtomicUsize,
    resets: AtomicUsize,
}

impl Cluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, host: &str, script: Script) {
        self.scripts.lock().insert(host.to_string(), script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn hosts_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.host.clone()).collect()
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn registry(self: &Arc<Self>) -> TransportRegistry {
        TransportRegistry::empty().register("http", ScriptedFactory(self.clone()))
    }

    pub fn transport(self: &Arc<Self>, host: &str) -> Arc<dyn Transport> {
        Arc::new(ScriptedTransport {
            host: host.to_string(),
            cluster: self.clone(),
        })
    }
}

pub struct ScriptedTransport {
    host: String,
    cluster: Arc<Cluster>,
}

impl Transport for ScriptedTransport {
    fn host(&self) -> &str {
        &self.host
    }

    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        self.cluster.calls.lock().push(Call {
            host: self.host.clone(),
            request: request.clone(),
        });

        let script = self
            .cluster
            .scripts
            .lock()
            .get(&self.host)
            .cloned()
            .unwrap_or_else(|| respond(200, "{}"));

        match script {
            Script::Refuse => Err(TransportError::ConnectionRefused {
                host: self.host.clone(),
            }),
            Script::Respond(status, body) => Ok(HttpResponse {
                status,
                reason: reason(status).to_string(),
                body,
            }),
        }
    }

    fn reset(&self) {
        self.cluster.resets.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedFactory(Arc<Cluster>);

impl TransportFactory for ScriptedFactory {
    fn build(&self, url: &Url, _config: &ConnectionConfig) -> Result<Arc<dyn Transport>> {
        self.0.built.fetch_add(1, Ordering::SeqCst);
        Ok(self.0.transport(url.as_str().trim_end_matches('/')))
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}
