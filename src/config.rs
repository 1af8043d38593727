use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tracing::warn;

use crate::store::default_db_path;

pub const ENV_HOST: &str = "DIVE_SCHEDULE_HOST";
pub const ENV_PORT: &str = "DIVE_SCHEDULE_PORT";
pub const ENV_DB: &str = "DIVE_SCHEDULE_DB";

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            db_path: default_db_path(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_HOST) {
            match raw.parse() {
                Ok(host) => config.host = host,
                Err(_) => warn!(value = %raw, "ignoring invalid {}", ENV_HOST),
            }
        }
        if let Some(raw) = lookup(ENV_PORT) {
            match raw.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %raw, "ignoring invalid {}", ENV_PORT),
            }
        }
        if let Some(raw) = lookup(ENV_DB).filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(raw);
        }

        config
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
