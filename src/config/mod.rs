//! Configuration management.
//!
//! Settings come from a TOML file (an explicit path or the platform config
//! directory) and are then overridden by `KNOWSTORE_*` environment variables:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `KNOWSTORE_BACKEND` | `backend` (`memory`, `file`, `postgres`) |
//! | `KNOWSTORE_FILE_PATH` | `file.path` |
//! | `KNOWSTORE_PG_CRUD_URL` | `postgres.crud_url` |
//! | `KNOWSTORE_PG_DDL_URL` | `postgres.ddl_url` |
//! | `KNOWSTORE_ACCOUNT_ID` | `postgres.account_id` |
//! | `KNOWSTORE_PG_MAX_CONNS` | `postgres.pool_max_size` |
//! | `KNOWSTORE_PG_QUERY_TIMEOUT` | `postgres.query_timeout_secs` |
//! | `KNOWSTORE_LOG_LEVEL` | `logging.level` |
//! | `KNOWSTORE_LOG_FORMAT` | `logging.format` (`pretty`, `json`) |
//!
//! ```toml
//! backend = "file"
//!
//! [file]
//! path = "/var/lib/knowstore/knowledge.json"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which storage backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Volatile in-memory store.
    #[default]
    Memory,
    /// Single JSON file.
    File,
    /// PostgreSQL (requires the `postgres` feature).
    Postgres,
}

impl BackendKind {
    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend name (case-insensitive, `postgresql` and `pg` accepted).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "file" | "json" => Some(Self::File),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSettings {
    /// Path of the JSON document.
    pub path: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        let path = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".knowstore").join("knowledge.json"),
            |dirs| dirs.data_dir().join("knowstore").join("knowledge.json"),
        );
        Self { path }
    }
}

/// PostgreSQL backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    /// Connection URL for the least-privilege CRUD pool.
    pub crud_url: String,
    /// Connection URL for migrations and schema checks; the CRUD URL when unset.
    pub ddl_url: Option<String>,
    /// Account that owns every record this store touches (a non-nil UUID).
    pub account_id: String,
    /// Maximum connections per pool (20 when unset).
    pub pool_max_size: Option<usize>,
    /// Deadline for each database call, in seconds.
    pub query_timeout_secs: u64,
}

impl PostgresSettings {
    /// Default per-call deadline.
    pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

    /// Creates settings for a single URL used by both pools.
    #[must_use]
    pub fn new(url: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            crud_url: url.into(),
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    /// Returns the DDL URL, falling back to the CRUD URL.
    #[must_use]
    pub fn ddl_url(&self) -> &str {
        self.ddl_url.as_deref().unwrap_or(&self.crud_url)
    }

    /// Returns the per-call deadline.
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            crud_url: "postgresql://localhost/knowstore".to_string(),
            ddl_url: None,
            account_id: String::new(),
            pool_max_size: None,
            query_timeout_secs: Self::DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Main configuration for knowstore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowstoreConfig {
    /// Backend to build.
    pub backend: BackendKind,
    /// File backend settings.
    pub file: FileSettings,
    /// PostgreSQL backend settings.
    pub postgres: PostgresSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Configuration file as written on disk; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Backend name.
    pub backend: Option<String>,
    /// `[file]` section.
    pub file: Option<ConfigFileFile>,
    /// `[postgres]` section.
    pub postgres: Option<ConfigFilePostgres>,
    /// `[logging]` section.
    pub logging: Option<ConfigFileLogging>,
}

/// `[file]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileFile {
    /// Document path.
    pub path: Option<String>,
}

/// `[postgres]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFilePostgres {
    /// CRUD pool URL.
    pub crud_url: Option<String>,
    /// DDL pool URL.
    pub ddl_url: Option<String>,
    /// Account UUID.
    pub account_id: Option<String>,
    /// Maximum connections per pool.
    pub pool_max_size: Option<usize>,
    /// Per-call deadline in seconds.
    pub query_timeout_secs: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl KnowstoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration: the given file (or the default location), then
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be read or parsed, or an
    /// override has an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(),
        };
        config.with_env_overrides()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Looks for `knowstore/config.toml` in the platform config directory,
    /// then in `~/.config`. Returns defaults if neither exists or parses.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("knowstore").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("knowstore")
                .join("config.toml"),
        ];
        for candidate in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = file.backend {
            config.backend = parse_backend(&backend)?;
        }
        if let Some(path) = file.file.and_then(|f| f.path) {
            config.file.path = PathBuf::from(path);
        }
        if let Some(pg) = file.postgres {
            if let Some(url) = pg.crud_url {
                config.postgres.crud_url = url;
            }
            config.postgres.ddl_url = pg.ddl_url.or(config.postgres.ddl_url);
            if let Some(account_id) = pg.account_id {
                config.postgres.account_id = account_id;
            }
            config.postgres.pool_max_size = pg.pool_max_size.or(config.postgres.pool_max_size);
            if let Some(secs) = pg.query_timeout_secs {
                config.postgres.query_timeout_secs = secs;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        Ok(config)
    }

    /// Applies `KNOWSTORE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable has an invalid value.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup, using the environment variable names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a value is invalid.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("KNOWSTORE_BACKEND") {
            self.backend = parse_backend(&v)?;
        }
        if let Some(v) = get("KNOWSTORE_FILE_PATH") {
            self.file.path = PathBuf::from(v);
        }
        if let Some(v) = get("KNOWSTORE_PG_CRUD_URL") {
            self.postgres.crud_url = v;
        }
        if let Some(v) = get("KNOWSTORE_PG_DDL_URL") {
            self.postgres.ddl_url = Some(v);
        }
        if let Some(v) = get("KNOWSTORE_ACCOUNT_ID") {
            self.postgres.account_id = v;
        }
        if let Some(v) = get("KNOWSTORE_PG_MAX_CONNS") {
            self.postgres.pool_max_size = Some(parse_number("KNOWSTORE_PG_MAX_CONNS", &v)?);
        }
        if let Some(v) = get("KNOWSTORE_PG_QUERY_TIMEOUT") {
            self.postgres.query_timeout_secs = parse_number("KNOWSTORE_PG_QUERY_TIMEOUT", &v)?;
        }
        if let Some(v) = get("KNOWSTORE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("KNOWSTORE_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&v);
        }

        Ok(self)
    }

    /// Sets the backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the file backend path.
    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file.path = path.into();
        self
    }
}

fn parse_backend(s: &str) -> Result<BackendKind> {
    BackendKind::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown backend '{s}'")))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a non-negative integer, got '{value}'")))
}
