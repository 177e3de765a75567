//! Table sizing and log-level knobs (SPEC_FULL.md §2 item 3), loaded
//! either from the environment or a TOML file — the same two
//! constructors the teacher's own config module exposes.

use std::env;
use toml::Table;

pub struct Config {
    /// Sizing hint fed to `HashTableMap::new` / `hash::order_for`.
    pub max_size: usize,
    /// Passed to `env_logger::Builder` by the demo binary; does not
    /// affect library behavior.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_size: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Config {
        let max_size = env::var("SHARDMAP_MAX_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);
        let log_level = env::var("SHARDMAP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Config { max_size, log_level }
    }

    pub fn from_toml(file: &str) -> Config {
        let toml = std::fs::read_to_string(file).unwrap();
        let table = toml.parse::<Table>().unwrap();
        let max_size = table
            .get("max_size")
            .and_then(|v| v.as_integer())
            .map(|v| v as usize)
            .unwrap_or(1024);
        let log_level = table
            .get("log_level")
            .and_then(|v| v.as_str())
            .unwrap_or("info")
            .to_string();
        Config { max_size, log_level }
    }
}
