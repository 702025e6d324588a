//! Configuration for impmail

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Preference configuration
    #[serde(default)]
    pub prefs: PrefsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname, reported as the MDN reporting user agent host
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend: only "postgres" is supported
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Preference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefsConfig {
    /// Preference backend: "memory" or "postgres"
    #[serde(default = "default_prefs_backend")]
    pub backend: String,

    /// Application scope the preferences are stored under
    #[serde(default = "default_prefs_scope")]
    pub scope: String,

    /// Factory default values, merged over the built-in defaults
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,

    /// Preferences users may not change
    #[serde(default)]
    pub locked: Vec<String>,
}

impl Default for PrefsConfig {
    fn default() -> Self {
        Self {
            backend: default_prefs_backend(),
            scope: default_prefs_scope(),
            defaults: BTreeMap::new(),
            locked: Vec::new(),
        }
    }
}

fn default_prefs_backend() -> String {
    "memory".to_string()
}

fn default_prefs_scope() -> String {
    "imp".to_string()
}

impl PrefsConfig {
    /// Built-in defaults with the configured overrides applied
    pub fn default_values(&self) -> BTreeMap<String, String> {
        let mut values: BTreeMap<String, String> = [
            ("sortpref", ""),
            ("sortby", "10"),
            ("sortdir", "0"),
            ("expanded_folders", ""),
            ("nav_poll", ""),
            ("mail_hdr", ""),
            ("send_mdn", "1"),
            ("use_trash", "0"),
            ("add_source", ""),
            ("time_format", "%X"),
            ("date_format", "%x"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (name, value) in &self.defaults {
            values.insert(name.clone(), value.clone());
        }

        values
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./impmail.toml"),
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/impmail/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let server = ServerConfig::default();
        assert_eq!(server.hostname, "localhost");

        let prefs = PrefsConfig::default();
        assert_eq!(prefs.backend, "memory");
        assert_eq!(prefs.scope, "imp");
        assert!(prefs.locked.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "webmail.example.com"

[database]
url = "postgres://localhost/impmail"
acquire_timeout = 5

[logging]
format = "json"

[prefs]
backend = "postgres"
locked = ["sortpref"]

[prefs.defaults]
sortby = "100"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "webmail.example.com");
        assert_eq!(config.database.backend, "postgres");
        assert_eq!(config.database.acquire_timeout, 5);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.prefs.locked, vec!["sortpref".to_string()]);

        let defaults = config.prefs.default_values();
        assert_eq!(defaults.get("sortby").map(String::as_str), Some("100"));
        assert_eq!(defaults.get("sortdir").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhostname = \"mx.example.org\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.hostname, "mx.example.org");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nhostname = ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
