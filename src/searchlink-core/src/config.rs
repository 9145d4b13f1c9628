use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client-level configuration shared by every node in the host list
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Consecutive transport failures tolerated before a call gives up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

fn default_max_retries() -> u32 {
    10
}

impl ClientConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            connection: ConnectionConfig::default(),
        }
    }
}

/// Per-node transport timeouts, in seconds.
///
/// `connect_timeout`, `send_timeout` and `receive_timeout` fall back to
/// `timeout` when unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_timeout: Option<f64>,
}

fn default_timeout() -> f64 {
    5.0
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: None,
            send_timeout: None,
            receive_timeout: None,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        self.resolve(self.connect_timeout)
    }

    pub fn send_timeout(&self) -> Duration {
        self.resolve(self.send_timeout)
    }

    pub fn receive_timeout(&self) -> Duration {
        self.resolve(self.receive_timeout)
    }

    fn resolve(&self, specific: Option<f64>) -> Duration {
        specific
            .and_then(seconds)
            .or_else(|| seconds(self.timeout))
            .unwrap_or_else(|| Duration::from_secs_f64(default_timeout()))
    }
}

/// Negative, NaN and overflowing values are rejected
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}
