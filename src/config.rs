use crate::core::db::{self, ConnectParams};
use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection configuration.
///
/// `kind` selects the driver; the remaining keys are the connection
/// parameters, with driver-specific settings under `[database.options]`.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    pub kind: String,
    #[serde(flatten)]
    pub params: ConnectParams,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Parses `level` into a tracing filter.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| DbError::Config(format!("invalid logging level: {}", self.level)))
    }
}

/// Default configuration location: `<config dir>/websetup/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("websetup").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```ignore
/// let config = load_config("config.toml")?;
/// initialize_from_config(&config.database)?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))?;
    config.logging.level_filter()?;
    Ok(config)
}

/// Records the process-wide driver described by `config`.
pub fn initialize_from_config(config: &DatabaseConfig) -> Result<()> {
    db::initialize(&config.kind, config.params.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[database]
kind = "network-sql"
schema = "websetup"
host = "db.internal"
port = 3307
user = "www"
password = "secret"

[database.options]
charset = "utf8mb4"

[logging]
level = "debug"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = parse_config(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.database.kind, "network-sql");
        let params = &config.database.params;
        assert_eq!(params.schema, "websetup");
        assert_eq!(params.host.as_deref(), Some("db.internal"));
        assert_eq!(params.port, Some(3307));
        assert_eq!(params.user.as_deref(), Some("www"));
        assert_eq!(params.password.as_deref(), Some("secret"));
        assert_eq!(params.options.get("charset").map(String::as_str), Some("utf8mb4"));
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(
            r#"
[database]
kind = "sqlite"
schema = "/tmp/websetup.db"
"#,
        )
        .unwrap();
        assert_eq!(config.database.params, ConnectParams::new("/tmp/websetup.db"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::INFO);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        assert!(matches!(parse_config("[database]\nschema = \"x\""), Err(DbError::Config(_))));
        assert!(matches!(
            parse_config("[database]\nkind = \"sqlite\"\nschema = \"x\"\n[logging]\nlevel = \"loud\""),
            Err(DbError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(dir.path().join("absent.toml")),
            Err(DbError::Io(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE_CONFIG).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.database.params.port, Some(3307));
    }

    #[test]
    fn test_default_config_path_ends_with_app_dir() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("websetup/config.toml"));
        }
    }
}
