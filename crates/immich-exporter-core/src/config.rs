//! Startup settings and their validation.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_POLL_FREQUENCY_SECS: u64 = 15;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("IMMICH_HOST must not be empty")]
    MissingHost,

    #[error("IMMICH_KEY must not be empty")]
    MissingKey,

    #[error("POLL_FREQUENCY must be at least 1 second")]
    ZeroPollFrequency,

    #[error("REQUEST_TIMEOUT must be at least 1 second")]
    ZeroRequestTimeout,

    #[error("SHUTDOWN_GRACE must be at least 1 second")]
    ZeroShutdownGrace,

    #[error("LISTEN_ADDRESS '{0}' is not an IP address")]
    InvalidListenAddress(String),
}

/// Unvalidated settings as read from the command line and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub immich_host: String,
    pub immich_key: String,
    pub poll_frequency_secs: u64,
    pub listen_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            immich_host: String::new(),
            immich_key: String::new(),
            poll_frequency_secs: DEFAULT_POLL_FREQUENCY_SECS,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_owned(),
            port: DEFAULT_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

/// Validated exporter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub immich_host: String,
    pub immich_key: String,
    pub poll_interval: Duration,
    pub listen: SocketAddr,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Settings {
    pub fn validate(self) -> Result<Config, ConfigError> {
        let immich_host = self.immich_host.trim().to_owned();
        if immich_host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        let immich_key = self.immich_key.trim().to_owned();
        if immich_key.is_empty() {
            return Err(ConfigError::MissingKey);
        }
        if self.poll_frequency_secs == 0 {
            return Err(ConfigError::ZeroPollFrequency);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        if self.shutdown_grace_secs == 0 {
            return Err(ConfigError::ZeroShutdownGrace);
        }
        let ip: IpAddr = self
            .listen_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.listen_address.clone()))?;

        Ok(Config {
            immich_host,
            immich_key,
            poll_interval: Duration::from_secs(self.poll_frequency_secs),
            listen: SocketAddr::new(ip, self.port),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        })
    }
}
