use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub session: SessionSettings,
    pub log: LogSettings,
}

/// Addresses the HTTP server (and the optional WebSocket listener) bind to.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// WebSocket push listener; disabled when `None`.
    pub ws_port: Option<u16>,
}

/// Configuration settings for the broadcast bus.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Name of the single topic every message is published to.
    pub topic: String,
    /// Slots in each subscriber's delivery queue before it is evicted.
    pub queue_capacity: usize,
}

/// Per-connection stream settings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Idle seconds before a keep-alive frame is emitted; `0` disables it.
    pub heartbeat_secs: u64,
    pub write_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub session: Option<PartialSessionSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ws_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub topic: Option<String>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSessionSettings {
    pub heartbeat_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                ws_port: None,
            },
            broker: BrokerSettings::default(),
            session: SessionSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            topic: "chat".to_string(),
            queue_capacity: 1024,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_secs: 15,
            write_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Fills every value missing from `partial` with the defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.unwrap_or_default();
        let broker = partial.broker.unwrap_or_default();
        let session = partial.session.unwrap_or_default();
        let log = partial.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                ws_port: server.ws_port.or(default.server.ws_port),
            },
            broker: BrokerSettings {
                topic: broker.topic.unwrap_or(default.broker.topic),
                queue_capacity: broker
                    .queue_capacity
                    .unwrap_or(default.broker.queue_capacity)
                    .max(1),
            },
            session: SessionSettings {
                heartbeat_secs: session
                    .heartbeat_secs
                    .unwrap_or(default.session.heartbeat_secs),
                write_timeout_secs: session
                    .write_timeout_secs
                    .unwrap_or(default.session.write_timeout_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn ws_addr(&self) -> Option<String> {
        self.server
            .ws_port
            .map(|port| format!("{}:{}", self.server.host, port))
    }
}
