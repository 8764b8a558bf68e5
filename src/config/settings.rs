use std::time::Duration;

use serde::Deserialize;

use crate::upstream::ExponentialBackoff;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub upstream: UpstreamSettings,
    pub log: LogSettings,
}

/// Defines the host and port the WebSocket server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_connections: usize,
}

/// Configuration settings for the upstream pub/sub backend.
///
/// `backend` is `"redis"` or `"memory"`. An empty `default_topic` disables the
/// pinned broadcast channel. `call_timeout_ms` bounds each subscribe or
/// unsubscribe attempt; `reconnect_backoff_ms` is the first delay before
/// reconnecting a dropped Redis pubsub connection.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub backend: String,
    pub host: String,
    pub port: u16,
    pub default_topic: String,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub call_timeout_ms: u64,
    pub reconnect_backoff_ms: u64,
}

impl UpstreamSettings {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    pub fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.retry_attempts.max(1),
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms.max(1))
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub upstream: Option<PartialUpstreamSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialUpstreamSettings {
    pub backend: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub default_topic: Option<String>,
    pub retry_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub call_timeout_ms: Option<u64>,
    pub reconnect_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                max_connections: 1000,
            },
            upstream: UpstreamSettings {
                backend: "redis".to_string(),
                host: "localhost".to_string(),
                port: 6379,
                default_topic: "test-channel".to_string(),
                retry_attempts: 1,
                retry_backoff_ms: 100,
                call_timeout_ms: 5000,
                reconnect_backoff_ms: 500,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;
        let upstream = self.upstream;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
            },
            upstream: UpstreamSettings {
                backend: upstream
                    .as_ref()
                    .and_then(|u| u.backend.clone())
                    .unwrap_or(default.upstream.backend),
                host: upstream
                    .as_ref()
                    .and_then(|u| u.host.clone())
                    .unwrap_or(default.upstream.host),
                port: upstream
                    .as_ref()
                    .and_then(|u| u.port)
                    .unwrap_or(default.upstream.port),
                default_topic: upstream
                    .as_ref()
                    .and_then(|u| u.default_topic.clone())
                    .unwrap_or(default.upstream.default_topic),
                retry_attempts: upstream
                    .as_ref()
                    .and_then(|u| u.retry_attempts)
                    .unwrap_or(default.upstream.retry_attempts),
                retry_backoff_ms: upstream
                    .as_ref()
                    .and_then(|u| u.retry_backoff_ms)
                    .unwrap_or(default.upstream.retry_backoff_ms),
                call_timeout_ms: upstream
                    .as_ref()
                    .and_then(|u| u.call_timeout_ms)
                    .unwrap_or(default.upstream.call_timeout_ms),
                reconnect_backoff_ms: upstream
                    .as_ref()
                    .and_then(|u| u.reconnect_backoff_ms)
                    .unwrap_or(default.upstream.reconnect_backoff_ms),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
