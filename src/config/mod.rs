//! Configuration management.
//!
//! Configuration comes from three layers, later layers winning:
//! built-in defaults, an optional TOML file, and `LABELGATE_*` environment
//! variables.
//!
//! # Environment Variables
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `LABELGATE_RECORD_PATH` | path | `labeled.json` | Record file location |
//! | `LABELGATE_MAX_CONCURRENT` | usize | `8` | Items in flight per stage |
//! | `LABELGATE_DUMP_POLICY` | `per-item` / `on-finish` | `per-item` | When the dump stage writes |
//! | `LABELGATE_LOG_FORMAT` | `pretty` / `json` | `pretty` | Log output format |
//! | `LABELGATE_LOG_FILE` | path | unset | Append logs to this file |
//! | `LABELGATE_LOG_FILTER` | directive | `labelgate=info` | Default log filter |

use crate::observability::{LogFormat, LoggingConfig};
use crate::pipeline::DEFAULT_MAX_CONCURRENT;
use crate::storage::DEFAULT_RECORD_FILE;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// When the dump stage writes the record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpPolicy {
    /// Rewrite the record file for every item with content.
    #[default]
    PerItem,
    /// Write once, after the last item has passed the dump stage.
    OnFinish,
}

impl DumpPolicy {
    /// Parses a policy name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-item" | "item" => Some(Self::PerItem),
            "on-finish" | "finish" | "batched" => Some(Self::OnFinish),
            _ => None,
        }
    }

    /// Returns the canonical policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PerItem => "per-item",
            Self::OnFinish => "on-finish",
        }
    }
}

/// Main configuration for labelgate.
#[derive(Debug, Clone)]
pub struct LabelgateConfig {
    /// Path to the record file.
    pub record_path: PathBuf,
    /// Items processed concurrently by each stage.
    pub max_concurrent: usize,
    /// Dump stage write policy.
    pub dump_policy: DumpPolicy,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Record file path.
    pub record_path: Option<String>,
    /// Concurrency per stage.
    pub max_concurrent: Option<usize>,
    /// Dump policy name.
    pub dump_policy: Option<String>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

impl Default for LabelgateConfig {
    fn default() -> Self {
        Self {
            record_path: PathBuf::from(DEFAULT_RECORD_FILE),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            dump_policy: DumpPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LabelgateConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let mut config = Self::default();
        config.apply_config_file(file)?;
        Ok(config)
    }

    /// Loads configuration from defaults and environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies values from a parsed config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown dump policies, unknown log
    /// formats, or a zero concurrency.
    pub fn apply_config_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(path) = file.record_path {
            self.record_path = PathBuf::from(path);
        }
        if let Some(max) = file.max_concurrent {
            if max == 0 {
                return Err(Error::InvalidInput(
                    "max_concurrent must be at least 1".to_string(),
                ));
            }
            self.max_concurrent = max;
        }
        if let Some(policy) = file.dump_policy {
            self.dump_policy = DumpPolicy::parse(&policy)
                .ok_or_else(|| Error::InvalidInput(format!("unknown dump_policy: {policy}")))?;
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                self.logging.format = LogFormat::parse(&format)
                    .ok_or_else(|| Error::InvalidInput(format!("unknown log format: {format}")))?;
            }
            if let Some(log_file) = logging.file {
                self.logging.file = Some(PathBuf::from(log_file));
            }
            if let Some(filter) = logging.filter {
                self.logging.filter = filter;
            }
        }
        Ok(())
    }

    /// Applies `LABELGATE_*` environment overrides.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("LABELGATE_RECORD_PATH")
            && !v.is_empty()
        {
            self.record_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LABELGATE_MAX_CONCURRENT")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.max_concurrent = parsed.max(1);
        }
        if let Ok(v) = std::env::var("LABELGATE_DUMP_POLICY")
            && let Some(policy) = DumpPolicy::parse(&v)
        {
            self.dump_policy = policy;
        }
        self.logging = self.logging.with_env_overrides();
        self
    }

    /// Builder method to set the record path.
    #[must_use]
    pub fn with_record_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = path.into();
        self
    }

    /// Builder method to set the concurrency per stage.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = if max == 0 { 1 } else { max };
        self
    }

    /// Builder method to set the dump policy.
    #[must_use]
    pub const fn with_dump_policy(mut self, policy: DumpPolicy) -> Self {
        self.dump_policy = policy;
        self
    }
}
