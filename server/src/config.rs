//! Configuration management for the server.

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Simulated network delay applied to every store call
    pub latency: Duration,
    /// Start with the demo users instead of an empty store
    pub seed_users: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let latency = env::var("LATENCY_MS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidLatency)?;

        let seed_users = match env::var("SEED_USERS") {
            Ok(value) => parse_flag(&value).ok_or(ConfigError::InvalidSeedUsers)?,
            Err(_) => true,
        };

        Ok(Self {
            host,
            port,
            latency,
            seed_users,
        })
    }

    /// Delay for bulk operations, which the store treats as heavier.
    pub fn bulk_latency(&self) -> Duration {
        self.latency + Duration::from_millis(200)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid LATENCY_MS value")]
    InvalidLatency,

    #[error("Invalid SEED_USERS value")]
    InvalidSeedUsers,
}
