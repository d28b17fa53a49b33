//! Server settings loaded from a TOML file.
//!
//! Every key has a default, so an empty file (or no file) is a valid
//! configuration:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! backend = "sqlite"
//! connection_string = "slabs.db"
//!
//! [regime]
//! default = "current"
//!
//! [regime.current]
//! cess_rate = "0.04"
//!
//! [sessions]
//! idle_timeout_secs = 1800
//! max_sessions = 10000
//!
//! [logging]
//! filter = "info"
//! file = "tax-server.log"
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tax_core::Regime;
use tax_core::calculations::{
    CurrentRegimeConfig, LegacyRegimeConfig, RegimeConfigError, RegimeSettings,
};
use tax_core::db::DbConfig;
use thiserror::Error;

use crate::session::SessionLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid regime settings: {0}")]
    Regime(#[from] RegimeConfigError),

    #[error("sessions.max_sessions must be at least 1")]
    NoSessions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub database: DbConfig,
    pub regime: RegimeConfig,
    pub sessions: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl ListenConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Regime used when a request does not name one, plus the parameters of
/// both regimes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub default: Regime,
    pub legacy: LegacyRegimeConfig,
    pub current: CurrentRegimeConfig,
}

impl RegimeConfig {
    pub fn settings(&self) -> RegimeSettings {
        RegimeSettings {
            legacy: self.legacy.clone(),
            current: self.current.clone(),
        }
    }
}

/// Lifetime and number of per-session result caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let limits = SessionLimits::default();
        Self {
            idle_timeout_secs: limits.idle_timeout.as_secs(),
            max_sessions: limits.max_sessions,
        }
    }
}

impl SessionConfig {
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            max_sessions: self.max_sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub filter: String,

    /// Append log records to this file as well as stdout.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, or returns the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.regime.legacy.validate()?;
        self.regime.current.validate()?;
        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::NoSessions);
        }
        Ok(())
    }
}
