use crate::core::{OrmError, Result};
use serde::{Deserialize, Serialize};

pub const MEMORY_PATH: &str = ":memory:";

/// Database connection configuration
///
/// Can be built in code, parsed from a `sqlite://` URL or loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path, or `:memory:`
    pub path: String,

    /// Log failing statements together with their bound values
    pub debug: bool,

    /// Open one connection per calling thread instead of sharing one
    pub per_thread: bool,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: MEMORY_PATH.to_string(),
            debug: false,
            per_thread: false,
            busy_timeout_ms: None,
        }
    }
}

impl DatabaseConfig {
    /// In-memory configuration
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed configuration
    pub fn file(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    /// Enable or disable statement logging on failure
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable per-thread connections
    pub fn per_thread(mut self, per_thread: bool) -> Self {
        self.per_thread = per_thread;
        self
    }

    /// Set the busy timeout
    pub fn busy_timeout_ms(mut self, timeout: u64) -> Self {
        self.busy_timeout_ms = Some(timeout);
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Parse from connection string
    ///
    /// Formats: `sqlite::memory:` and `sqlite://<path>`
    ///
    /// # Examples
    ///
    /// ```
    /// # use autumn::DatabaseConfig;
    /// let config = DatabaseConfig::from_url("sqlite:///tmp/app.db").unwrap();
    /// assert_eq!(config.path, "/tmp/app.db");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        if url == "sqlite::memory:" {
            return Ok(Self::in_memory());
        }

        let path = url.strip_prefix("sqlite://").ok_or_else(|| {
            OrmError::Configuration(format!("URL must start with 'sqlite://': {}", url))
        })?;

        let config = Self::file(path);
        config.validate().map_err(OrmError::Configuration)?;
        Ok(config)
    }

    /// Load from a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OrmError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("path cannot be empty".to_string());
        }

        if self.busy_timeout_ms == Some(0) {
            return Err("busy_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert!(config.is_memory());
        assert!(!config.debug);
        assert!(!config.per_thread);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = DatabaseConfig::file("app.db")
            .debug(true)
            .per_thread(true)
            .busy_timeout_ms(500);

        assert_eq!(config.path, "app.db");
        assert!(config.debug);
        assert!(config.per_thread);
        assert_eq!(config.busy_timeout_ms, Some(500));
    }

    #[test]
    fn test_from_url() {
        assert!(DatabaseConfig::from_url("sqlite::memory:").unwrap().is_memory());

        let config = DatabaseConfig::from_url("sqlite://data/app.db").unwrap();
        assert_eq!(config.path, "data/app.db");

        assert!(DatabaseConfig::from_url("mysql://root@localhost/autumn").is_err());
        assert!(DatabaseConfig::from_url("sqlite://").is_err());
    }

    #[test]
    fn test_from_json() {
        let config = DatabaseConfig::from_json_str(r#"{"path": "x.db", "debug": true}"#).unwrap();
        assert_eq!(config.path, "x.db");
        assert!(config.debug);
        assert!(!config.per_thread);

        assert!(DatabaseConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_validation() {
        let config = DatabaseConfig::file("  ");
        assert!(config.validate().is_err());

        let config = DatabaseConfig::default().busy_timeout_ms(0);
        assert!(config.validate().is_err());
    }
}
