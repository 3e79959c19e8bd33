//! Configuration module for ventwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "ventwatch.db")
    pub db_path: String,
    /// Create the default ICU sectors when the database has none (default: true)
    pub seed_sectors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "ventwatch.db".to_string(),
            seed_sectors: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VENTWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `VENTWATCH_DB_PATH`: Database file path (default: "ventwatch.db")
    /// - `VENTWATCH_SEED_SECTORS`: "true"/"false" (default: true)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port_str) = lookup("VENTWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Some(db_path) = lookup("VENTWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(seed) = lookup("VENTWATCH_SEED_SECTORS") {
            if let Ok(seed) = seed.parse() {
                cfg.seed_sectors = seed;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "ventwatch.db");
        assert!(cfg.seed_sectors);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let cfg = ServerConfig::from_lookup(|key| match key {
            "VENTWATCH_HTTP_PORT" => Some("not-a-port".to_string()),
            "VENTWATCH_DB_PATH" => Some("/var/lib/ventwatch/uci.db".to_string()),
            "VENTWATCH_SEED_SECTORS" => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "/var/lib/ventwatch/uci.db");
        assert!(!cfg.seed_sectors);
    }
}
