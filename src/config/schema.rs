//! Configuration schema definitions.
//!
//! `Config` is the raw flat key/value mapping read from disk. `Settings` is the
//! typed view the server binary runs on.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::loader::ConfigError;
use crate::config::validation::{ValidationError, Validator};

/// Flat, immutable mapping of configuration keys to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// Build a config from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for a key that must be present.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Parse a value, falling back to `default` when the key is absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// FastAGI port the dialplan points at.
pub const DEFAULT_AGI_PORT: u16 = 35498;

/// Typed server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub agi: AgiSettings,
    pub slack: SlackSettings,
    pub reconnect: ReconnectSettings,

    /// Log level directive used when RUST_LOG is unset.
    pub log_level: String,

    /// Prometheus exporter bind address; disabled when `None`.
    pub metrics_address: Option<SocketAddr>,

    /// How long to wait for in-flight sessions after shutdown.
    pub shutdown_grace: Duration,

    /// Member directory file; the welcome route is only registered when set.
    pub directory_file: Option<PathBuf>,
}

/// FastAGI listener settings.
#[derive(Debug, Clone)]
pub struct AgiSettings {
    pub bind_address: SocketAddr,
    pub max_sessions: usize,
}

/// Chat backend settings.
#[derive(Clone)]
pub struct SlackSettings {
    pub token: String,
    pub channel: String,
    pub api_url: String,
    pub ping_interval: Duration,
    pub request_timeout: Duration,
}

impl fmt::Debug for SlackSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackSettings")
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("api_url", &self.api_url)
            .field("ping_interval", &self.ping_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Backoff bounds for re-establishing a lost chat connection.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 60_000,
        }
    }
}

impl Settings {
    /// Build and validate the typed settings from a raw config.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut v = Validator::new(config);

        let interface: IpAddr = v.parse_or("AGI_INTERFACE", IpAddr::from([127, 0, 0, 1]));
        let port: u16 = v.parse_or("AGI_PORT", DEFAULT_AGI_PORT);
        let max_sessions = match usize::try_from(v.positive_or("AGI_MAX_SESSIONS", 256)) {
            Ok(n) if n <= Semaphore::MAX_PERMITS => n,
            _ => {
                v.push(ValidationError::OutOfRange {
                    key: "AGI_MAX_SESSIONS".to_string(),
                    reason: format!("must not exceed {}", Semaphore::MAX_PERMITS),
                });
                256
            }
        };

        let slack = SlackSettings {
            token: v.required("SLACK_TOKEN"),
            channel: v.required("SLACK_CHANNEL"),
            api_url: v
                .string_or("SLACK_API_URL", "https://slack.com/api")
                .trim_end_matches('/')
                .to_string(),
            ping_interval: Duration::from_secs(v.positive_or("SLACK_PING_SECS", 3)),
            request_timeout: Duration::from_secs(v.positive_or("SLACK_TIMEOUT_SECS", 10)),
        };

        let defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            base_delay_ms: v.positive_or("RECONNECT_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: v.positive_or("RECONNECT_MAX_MS", defaults.max_delay_ms),
        };
        if reconnect.base_delay_ms > reconnect.max_delay_ms {
            v.push(ValidationError::OutOfRange {
                key: "RECONNECT_BASE_MS".to_string(),
                reason: "must not exceed RECONNECT_MAX_MS".to_string(),
            });
        }

        let metrics_address = match config.get("METRICS_ADDRESS") {
            Some(raw) if !raw.trim().is_empty() => {
                Some(v.parse_or("METRICS_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 9090))))
            }
            _ => None,
        };

        let settings = Settings {
            agi: AgiSettings {
                bind_address: SocketAddr::new(interface, port),
                max_sessions,
            },
            slack,
            reconnect,
            log_level: v.string_or("LOG_LEVEL", "info"),
            metrics_address,
            shutdown_grace: Duration::from_secs(v.parse_or("SHUTDOWN_GRACE_SECS", 10)),
            directory_file: config.get("DIRECTORY_FILE").map(PathBuf::from),
        };

        v.finish().map_err(ConfigError::Validation)?;
        Ok(settings)
    }
}
