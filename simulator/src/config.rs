use serde::{Deserialize, Serialize};
use spinduel_execution::CasinoConfig;
use spinduel_types::{DUEL_REVEAL_DELAY_MS, DUEL_TTL_MS, LOSING_SPIN_RETRACT_MS};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

/// Retained transcript entries per room when unset.
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
}

/// On-disk configuration (YAML). Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path; in-memory when unset.
    pub database: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
    pub deterministic_seed: Option<u64>,
    pub duel_ttl_ms: u64,
    pub reveal_delay_ms: u64,
    pub retract_delay_ms: u64,
    pub transcript_limit: usize,
    /// Browser origins allowed by CORS ("*" allows any).
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            log_level: "info".to_string(),
            log_json: false,
            deterministic_seed: None,
            duel_ttl_ms: DUEL_TTL_MS,
            reveal_delay_ms: DUEL_REVEAL_DELAY_MS,
            retract_delay_ms: LOSING_SPIN_RETRACT_MS,
            transcript_limit: DEFAULT_TRANSCRIPT_LIMIT,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub database: Option<PathBuf>,
    pub log_level: Level,
    pub log_json: bool,
    pub deterministic_seed: Option<u64>,
    pub casino: CasinoConfig,
    pub transcript_limit: usize,
    pub allowed_origins: Vec<String>,
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        ensure_nonzero("duel_ttl_ms", self.duel_ttl_ms)?;
        ensure_nonzero("transcript_limit", self.transcript_limit as u64)?;

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        Ok(ValidatedConfig {
            database: self.database,
            log_level,
            log_json: self.log_json,
            deterministic_seed: self.deterministic_seed,
            casino: CasinoConfig {
                duel_ttl_ms: self.duel_ttl_ms,
                reveal_delay_ms: self.reveal_delay_ms,
                retract_delay_ms: self.retract_delay_ms,
            },
            transcript_limit: self.transcript_limit,
            allowed_origins: self.allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default().validate().unwrap();
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.casino, CasinoConfig::default());
        assert!(config.database.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::parse("log_level: debug\nduel_ttl_ms: 1000\n").unwrap();
        assert_eq!(config.duel_ttl_ms, 1000);
        assert_eq!(config.retract_delay_ms, LOSING_SPIN_RETRACT_MS);
        let validated = config.validate().unwrap();
        assert_eq!(validated.log_level, Level::DEBUG);
        assert_eq!(validated.casino.duel_ttl_ms, 1000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = Config {
            duel_ttl_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNonZero {
                field: "duel_ttl_ms",
                ..
            })
        ));

        let config = Config {
            log_level: "loud".into(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid log level: loud");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database: /tmp/spinduel.db\nlog_json: true").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/spinduel.db")));
        assert!(config.log_json);

        assert!(matches!(
            Config::load(Path::new("/definitely/not/here.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
