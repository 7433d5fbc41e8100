//! Engine configuration - environment variable parsing

use std::env;

use crate::constants::DEFAULT_WORKER_THREADS;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Threads in the steering worker pool.
    pub worker_threads: usize,
    /// Authoritative server (runs detonation and teardown side effects).
    pub is_server: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            is_server: true,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let worker_threads = match env::var("SEEKER_WORKERS") {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid("SEEKER_WORKERS", raw)),
            },
            Err(_) => DEFAULT_WORKER_THREADS,
        };

        let is_server = match env::var("SEEKER_ROLE") {
            Ok(raw) => match raw.as_str() {
                "server" => true,
                "client" => false,
                _ => return Err(ConfigError::Invalid("SEEKER_ROLE", raw)),
            },
            Err(_) => true,
        };

        Ok(Self {
            worker_threads,
            is_server,
            log_level: env::var("SEEKER_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}
