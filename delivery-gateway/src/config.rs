//! Configuration module for environment variable parsing.
//!
//! Configuration is read once at startup into an immutable [`Config`] value
//! that is handed to the components needing it. A missing mandatory variable
//! is a [`ConfigError`] and the process refuses to start.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Variables that must be present for the gateway to start.
pub const MANDATORY_VARIABLES: [&str; 3] = ["BROKER_HOST", "BROKER_USERNAME", "BROKER_PASSWORD"];

/// Error raised when the environment does not describe a usable configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing mandatory environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for environment variable {name}")]
    Invalid { name: &'static str, value: String },
}

/// Connection settings for the message broker.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker hostname
    pub host: String,

    /// AMQP port
    pub port: u16,

    pub username: String,

    pub password: String,

    /// Virtual host the queues live in
    pub vhost: String,

    /// Upper bound for opening a connection and its channel
    pub connect_timeout: Duration,
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub broker: BrokerConfig,

    /// Exchange used when a registration does not name one
    pub default_exchange: Option<String>,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let broker = BrokerConfig {
            host: required("BROKER_HOST")?,
            username: required("BROKER_USERNAME")?,
            password: required("BROKER_PASSWORD")?,
            vhost: lookup("BROKER_VHOST").unwrap_or_else(|| "/".to_string()),
            port: parse_or(&lookup, "BROKER_PORT", 5672)?,
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "BROKER_CONNECT_TIMEOUT_MS",
                10_000,
            )?),
        };

        Ok(Config {
            broker,
            default_exchange: lookup("DEFAULT_EXCHANGE").filter(|v| !v.is_empty()),
            port: parse_or(&lookup, "PORT", 5000)?,
        })
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const MINIMAL: [(&str, &str); 3] = [
        ("BROKER_HOST", "rabbit.internal"),
        ("BROKER_USERNAME", "gateway"),
        ("BROKER_PASSWORD", "s3cret"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&MINIMAL)).unwrap();
        assert_eq!(config.broker.host, "rabbit.internal");
        assert_eq!(config.broker.vhost, "/");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.broker.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.default_exchange, None);
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_optional_overrides() {
        let mut vars = MINIMAL.to_vec();
        vars.extend([
            ("BROKER_VHOST", "notifications"),
            ("BROKER_PORT", "5673"),
            ("BROKER_CONNECT_TIMEOUT_MS", "2500"),
            ("DEFAULT_EXCHANGE", "events"),
            ("PORT", "8080"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.broker.vhost, "notifications");
        assert_eq!(config.broker.port, 5673);
        assert_eq!(config.broker.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.default_exchange.as_deref(), Some("events"));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_each_mandatory_variable_required() {
        for missing in MANDATORY_VARIABLES {
            let vars: Vec<_> = MINIMAL.iter().copied().filter(|(k, _)| *k != missing).collect();
            assert_eq!(
                Config::from_lookup(lookup(&vars)),
                Err(ConfigError::Missing(missing))
            );
        }
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("BROKER_PORT", "amqp"));
        assert_eq!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid {
                name: "BROKER_PORT",
                value: "amqp".to_string()
            })
        );
    }

    #[test]
    fn test_empty_default_exchange_is_unset() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("DEFAULT_EXCHANGE", ""));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.default_exchange, None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_lookup(lookup(&MINIMAL)).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
