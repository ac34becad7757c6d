// ABOUTME: Configuration loading and validation for the hollowdex server.
// ABOUTME: Reads HOLLOWDEX_* environment variables and rejects malformed values up front.

use std::net::SocketAddr;
use std::path::PathBuf;

use http::HeaderValue;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOLLOWDEX_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("{var} must be a non-negative integer in range, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("HOLLOWDEX_CORS_ORIGINS contains an invalid origin: {0:?}")]
    InvalidOrigin(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HollowdexConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    /// Snapshots kept per backup stream. None disables pruning.
    pub backup_retain: Option<usize>,
    pub cors_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

const DEFAULT_BIND: &str = "127.0.0.1:3001";
const DEFAULT_RETAIN: usize = 50;
const DEFAULT_BODY_LIMIT_MB: usize = 10;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

impl HollowdexConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - HOLLOWDEX_HOME: storage root (default: ./storage)
    /// - HOLLOWDEX_BIND: socket address to bind (default: 127.0.0.1:3001)
    /// - HOLLOWDEX_DB: SQLite catalog path (default: <home>/catalog.db)
    /// - HOLLOWDEX_BACKUP_RETAIN: backups kept per stream, 0 keeps all (default: 50)
    /// - HOLLOWDEX_CORS_ORIGINS: comma-separated allowed origins
    /// - HOLLOWDEX_BODY_LIMIT_MB: request body limit in megabytes (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let home = var("HOLLOWDEX_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./storage"));

        let bind_str = var("HOLLOWDEX_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let db_path = var("HOLLOWDEX_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("catalog.db"));

        let retain = parse_number("HOLLOWDEX_BACKUP_RETAIN", var("HOLLOWDEX_BACKUP_RETAIN"), DEFAULT_RETAIN)?;
        let backup_retain = (retain > 0).then_some(retain);

        let cors_origins = parse_origins(
            &var("HOLLOWDEX_CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
        )?;

        let body_limit_raw = var("HOLLOWDEX_BODY_LIMIT_MB");
        let body_limit_mb = parse_number(
            "HOLLOWDEX_BODY_LIMIT_MB",
            body_limit_raw.clone(),
            DEFAULT_BODY_LIMIT_MB,
        )?;
        let body_limit_bytes = body_limit_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            ConfigError::InvalidNumber {
                var: "HOLLOWDEX_BODY_LIMIT_MB",
                value: body_limit_raw.unwrap_or_default(),
            }
        })?;

        Ok(Self {
            home,
            bind,
            db_path,
            backup_retain,
            cors_origins,
            body_limit_bytes,
        })
    }

    /// Defaults rooted at `home`, for tests and embedding.
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            db_path: home.join("catalog.db"),
            home,
            bind: SocketAddr::from(([127, 0, 0, 1], 3001)),
            backup_retain: Some(DEFAULT_RETAIN),
            cors_origins: DEFAULT_CORS_ORIGINS.split(',').map(str::to_string).collect(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_MB * 1024 * 1024,
        }
    }
}

fn parse_number(
    var: &'static str,
    value: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map(|_| origin.to_string())
                .map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<HollowdexConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HollowdexConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn config_loads_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(config.home, PathBuf::from("./storage"));
        assert_eq!(config.db_path, PathBuf::from("./storage").join("catalog.db"));
        assert_eq!(config.backup_retain, Some(50));
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
        assert_eq!(config.body_limit_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn config_reads_overrides() {
        let config = load(&[
            ("HOLLOWDEX_HOME", "/srv/hollowdex"),
            ("HOLLOWDEX_BIND", "0.0.0.0:8080"),
            ("HOLLOWDEX_BACKUP_RETAIN", "0"),
            ("HOLLOWDEX_CORS_ORIGINS", "https://wiki.example.org, "),
            ("HOLLOWDEX_BODY_LIMIT_MB", "2"),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/srv/hollowdex/catalog.db"));
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.backup_retain, None, "zero disables pruning");
        assert_eq!(config.cors_origins, vec!["https://wiki.example.org"]);
        assert_eq!(config.body_limit_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn config_rejects_bad_values() {
        let err = load(&[("HOLLOWDEX_BIND", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("HOLLOWDEX_BIND"));

        let err = load(&[("HOLLOWDEX_BACKUP_RETAIN", "-3")]).unwrap_err();
        assert!(
            err.to_string().contains("HOLLOWDEX_BACKUP_RETAIN"),
            "error should name the variable: {}",
            err
        );

        let huge = usize::MAX.to_string();
        let err = load(&[("HOLLOWDEX_BODY_LIMIT_MB", huge.as_str())]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { var: "HOLLOWDEX_BODY_LIMIT_MB", .. }
        ));

        let err = load(&[("HOLLOWDEX_CORS_ORIGINS", "http://bad\norigin")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin(_)));
    }
}
