// Configuration loading and parsing (swingstats.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;

pub const CONFIG_FILE: &str = "swingstats.toml";
const DEFAULT_DB_FILE: &str = "swingstats.db";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub output: OutputConfig,
    /// Resolved database location: `database.path` when set, otherwise a file
    /// in the platform data directory.
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// swingstats.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire swingstats.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    analysis: AnalysisConfig,
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    ingest: IngestConfig,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Player every metric is computed for.
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

fn default_busy_timeout_ms() -> u32 {
    DEFAULT_BUSY_TIMEOUT_MS
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    /// Directory scanned for workbooks when no paths are given.
    #[serde(default)]
    pub inbox: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/swingstats.toml` relative to `base_dir`.
///
/// Does not auto-copy defaults; prefer `load_config()` which does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let db_path = match &file.database.path {
        Some(path) => path.clone(),
        None => default_db_path(),
    };

    let config = Config {
        analysis: file.analysis,
        database: file.database,
        ingest: file.ingest,
        output: file.output,
        db_path,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/swingstats.toml` from `defaults/` when it is missing.
/// Returns the seeded path, or `None` when a config file already exists.
/// An existing file is never overwritten.
pub fn seed_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no {CONFIG_FILE} in {}/config or {}/defaults",
                base_dir.display(),
                base_dir.display()
            ),
        });
    }

    let copy_error = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to seed {}: {e}", target.display()),
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(copy_error)?;
    }
    std::fs::copy(&source, &target).map_err(copy_error)?;

    info!("seeded {} from defaults", target.display());
    Ok(Some(target))
}

/// Load config relative to the current working directory, copying defaults
/// into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    seed_config_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// `<data dir>/swingstats.db`, falling back to the working directory when the
/// platform has no home directory.
fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "swingstats")
        .map(|dirs| dirs.data_dir().join(DEFAULT_DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
        .to_string_lossy()
        .into_owned()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.analysis.subject.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "analysis.subject".into(),
            message: "must not be empty".into(),
        });
    }

    if config.database.busy_timeout_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "database.busy_timeout_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty when set".into(),
        });
    }

    if config.output.dir.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "output.dir".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: the workspace `defaults/` directory.
    fn defaults_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../defaults")
    }

    /// Helper: a temp project whose `config/swingstats.toml` holds `contents`.
    fn project_with_config(contents: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), contents).unwrap();
        tmp
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::copy(defaults_dir().join(CONFIG_FILE), config_dir.join(CONFIG_FILE)).unwrap();

        let config = load_config_from(tmp.path()).expect("should load valid config");

        assert_eq!(config.analysis.subject, "Joao Cassis");
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(config.database.path.is_none());
        assert!(config.db_path.ends_with(DEFAULT_DB_FILE));
        assert_eq!(config.ingest.inbox.as_deref(), Some("inbox"));
        assert_eq!(config.output.dir, "output");
    }

    #[test]
    fn explicit_database_path_is_used_verbatim() {
        let tmp = project_with_config(
            "[analysis]\nsubject = \"A\"\n[database]\npath = \"data/tennis.db\"\n",
        );
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.db_path, "data/tennis.db");
    }

    #[test]
    fn optional_sections_take_defaults() {
        let tmp = project_with_config("[analysis]\nsubject = \"A\"\n");
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.database.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.ingest.inbox.is_none());
        assert_eq!(config.output.dir, "output");
    }

    #[test]
    fn rejects_empty_subject() {
        let tmp = project_with_config("[analysis]\nsubject = \"  \"\n");
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "analysis.subject"),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_zero_busy_timeout() {
        let tmp = project_with_config(
            "[analysis]\nsubject = \"A\"\n[database]\nbusy_timeout_ms = 0\n",
        );
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "database.busy_timeout_ms")
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = tempfile::tempdir().unwrap();
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = project_with_config("[analysis\nsubject = ");
        assert!(matches!(
            load_config_from(tmp.path()).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
    }

    #[test]
    fn parse_error_when_analysis_section_missing() {
        let tmp = project_with_config("[output]\ndir = \"out\"\n");
        assert!(matches!(
            load_config_from(tmp.path()).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
    }

    #[test]
    fn seed_copies_the_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::copy(defaults_dir().join(CONFIG_FILE), defaults.join(CONFIG_FILE)).unwrap();

        let seeded = seed_config_file(tmp.path()).expect("should succeed");

        let target = tmp.path().join("config").join(CONFIG_FILE);
        assert_eq!(seeded.as_deref(), Some(target.as_path()));
        let config = load_config_from(tmp.path()).expect("seeded config should load");
        assert_eq!(config.analysis.subject, "Joao Cassis");
    }

    #[test]
    fn seed_keeps_an_existing_config() {
        let tmp = project_with_config("# custom\n");
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::copy(defaults_dir().join(CONFIG_FILE), defaults.join(CONFIG_FILE)).unwrap();

        assert_eq!(seed_config_file(tmp.path()).expect("should succeed"), None);
        let content = fs::read_to_string(tmp.path().join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");
    }

    #[test]
    fn seed_errors_without_defaults_or_config() {
        let tmp = tempfile::tempdir().unwrap();
        match seed_config_file(tmp.path()).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains(CONFIG_FILE));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
    }
}
