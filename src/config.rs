//! Configuration loading from TOML
//!
//! Only the daemon binary consumes configuration; the library surface takes
//! everything through constructor arguments.
//!
//! # Configuration File Format
//!
//! ```toml
//! [daemon]
//! http_port = 8080          # port for the HTTP adapter controller
//! stats_interval_secs = 10  # 0 disables periodic statistics logging
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

fn default_stats_interval() -> u64 {
    10
}

/// Daemon settings
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Port the HTTP adapter controller binds on `0.0.0.0`
    ///
    /// **Required**: Yes (must be non-zero)
    pub http_port: u16,

    /// Seconds between statistics log lines; 0 disables them
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = basic_toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        if config.daemon.http_port == 0 {
            return Err(Error::Config(
                "daemon.http_port must be non-zero".to_string(),
            ));
        }

        Ok(config)
    }
}
