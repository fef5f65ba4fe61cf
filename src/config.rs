//! Server configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket server listens on
    pub bind_addr: SocketAddr,
    /// Name given to the pet created at startup
    pub pet_name: String,
    /// Period of the decay tick; `None` disables it
    pub tick_interval: Option<Duration>,
    /// Directory served as the front end
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            pet_name: "Tama".to_string(),
            tick_interval: Some(Duration::from_secs(60)),
            static_dir: PathBuf::from("web"),
        }
    }
}

/// Read a trimmed, non-empty environment variable
pub(crate) fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match env_value("TAMA_BIND") {
            Some(value) => value.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    key: "TAMA_BIND",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => defaults.bind_addr,
        };

        let tick_interval = match env_value("TAMA_TICK_SECONDS").and_then(|s| s.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.tick_interval,
        };

        Ok(Self {
            bind_addr,
            pet_name: env_value("TAMA_PET_NAME").unwrap_or(defaults.pet_name),
            tick_interval,
            static_dir: env_value("TAMA_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 4] = [
        "TAMA_BIND",
        "TAMA_PET_NAME",
        "TAMA_TICK_SECONDS",
        "TAMA_STATIC_DIR",
    ];

    fn clear() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.pet_name, "Tama");
        assert_eq!(config.tick_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        std::env::set_var("TAMA_BIND", "127.0.0.1:9000");
        std::env::set_var("TAMA_PET_NAME", " Mochi ");
        std::env::set_var("TAMA_TICK_SECONDS", "0");

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.pet_name, "Mochi");
        assert!(config.tick_interval.is_none());
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_bind_addr() {
        clear();
        std::env::set_var("TAMA_BIND", "not-an-address");

        let err = ServerConfig::from_env().unwrap_err();

        assert!(err.to_string().contains("TAMA_BIND"));
        clear();
    }
}
