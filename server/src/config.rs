use coup_execution::{lobby, SessionLimits};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 512;
pub const DEFAULT_READ_DEADLINE_MS: u64 = 60_000;
pub const DEFAULT_WRITE_DEADLINE_MS: u64 = 10_000;
pub const DEFAULT_KEEPALIVE_MS: u64 = 54_000;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Resolved against the working directory.
pub const DEFAULT_LOCALES_DIR: &str = "locales";

#[cfg(not(test))]
pub fn default_locales_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCALES_DIR)
}

/// Locale files shipped with the crate.
#[cfg(test)]
pub fn default_locales_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/locales"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    InvalidNonZero { field: &'static str },
    #[error("keepalive ({keepalive_ms}ms) must be shorter than the read deadline ({read_deadline_ms}ms)")]
    KeepaliveTooLong {
        keepalive_ms: u64,
        read_deadline_ms: u64,
    },
    #[error("invalid table limits: min_players={min}, max_players={max}")]
    InvalidLimits { min: usize, max: usize },
    #[error("default language must not be empty")]
    EmptyLanguage,
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Outbound messages buffered per connection before drops begin.
    pub mailbox_capacity: usize,
    /// Largest inbound frame accepted; larger frames end the connection.
    pub max_frame_bytes: usize,
    pub read_deadline_ms: u64,
    pub write_deadline_ms: u64,
    pub keepalive_ms: u64,
    pub locales_dir: PathBuf,
    pub default_language: String,
    pub min_players: usize,
    pub max_players: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_deadline_ms: DEFAULT_READ_DEADLINE_MS,
            write_deadline_ms: DEFAULT_WRITE_DEADLINE_MS,
            keepalive_ms: DEFAULT_KEEPALIVE_MS,
            locales_dir: default_locales_dir(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            min_players: lobby::DEFAULT_MIN_PLAYERS,
            max_players: lobby::DEFAULT_MAX_PLAYERS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity.max(1)
    }

    pub fn read_deadline(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_millis(self.write_deadline_ms)
    }

    pub fn keepalive_period(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms)
    }

    pub fn session_limits(&self) -> Result<SessionLimits, ConfigError> {
        SessionLimits::new(self.min_players, self.max_players).map_err(|_| {
            ConfigError::InvalidLimits {
                min: self.min_players,
                max: self.max_players,
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("mailbox_capacity", self.mailbox_capacity as u64),
            ("max_frame_bytes", self.max_frame_bytes as u64),
            ("read_deadline_ms", self.read_deadline_ms),
            ("write_deadline_ms", self.write_deadline_ms),
            ("keepalive_ms", self.keepalive_ms),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidNonZero { field });
            }
        }
        if self.keepalive_ms >= self.read_deadline_ms {
            return Err(ConfigError::KeepaliveTooLong {
                keepalive_ms: self.keepalive_ms,
                read_deadline_ms: self.read_deadline_ms,
            });
        }
        self.session_limits()?;
        if self.default_language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.mailbox_capacity(), 256);
        assert_eq!(config.read_deadline(), Duration::from_secs(60));
        assert_eq!(config.write_deadline(), Duration::from_secs(10));
        assert_eq!(config.keepalive_period(), Duration::from_secs(54));
        assert_eq!(config.session_limits().unwrap(), SessionLimits::default());
    }

    #[test]
    fn release_locales_default_is_relative() {
        assert!(std::path::Path::new(DEFAULT_LOCALES_DIR).is_relative());
        let bundled = default_locales_dir();
        assert!(bundled.ends_with(DEFAULT_LOCALES_DIR));
        assert!(bundled.join("en.json").is_file());
    }

    #[test]
    fn rejects_keepalive_past_read_deadline() {
        let config = ServerConfig {
            keepalive_ms: 60_000,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::KeepaliveTooLong {
                keepalive_ms: 60_000,
                read_deadline_ms: 60_000
            })
        );
    }

    #[test]
    fn rejects_zero_and_bad_limits() {
        let config = ServerConfig {
            write_deadline_ms: 0,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidNonZero {
                field: "write_deadline_ms"
            })
        );

        let config = ServerConfig {
            min_players: 7,
            max_players: 4,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLimits { min: 7, max: 4 })
        );
    }

    #[test]
    fn rejects_unknown_log_level() {
        let config = ServerConfig {
            log_level: "loud".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));
    }
}
