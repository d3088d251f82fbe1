//! Settings type definitions.
//!
//! All types use camelCase field names in JSON and `#[serde(default)]`, so a
//! partial file only needs the values it changes.

use std::collections::BTreeMap;
use std::time::Duration;

use courier_core::Advice;
use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080, "path": "/cometd" },
///   "broker": { "maxHoldMs": 25000 },
///   "logging": { "level": "debug", "modules": { "tower_http": "warn" } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourierSettings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port; 0 picks an ephemeral port.
    pub port: u16,
    /// Route that accepts envelope batches.
    pub path: String,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            path: "/bayeux".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Broker behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// Longest time an idle connect is held open, in milliseconds.
    pub max_hold_ms: u64,
    /// Advice sent when neither the client nor its session supplies one.
    pub advice: Advice,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_hold_ms: 10_000,
            advice: Advice::default(),
        }
    }
}

impl BrokerSettings {
    pub fn max_hold(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms)
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Per-module level overrides, e.g. `{"courier_broker": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
