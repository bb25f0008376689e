//! Core configuration.
//!
//! # Responsibility
//! - Describe tunables shared by the service, the store and the CLI.
//! - Load them from an optional JSON file with per-field defaults.
//!
//! # Invariants
//! - `namespace` is non-empty and contains no `:` separator.
//! - A missing config file yields defaults; an invalid one is an error.

use crate::store::annotation_store::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_EXPORT_FILE_NAME: &str = "annotations.json";
pub const DEFAULT_PROJECT_ID: &str = "sample";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreConfig {
    /// Durable key namespace, the `<namespace>` in `<namespace>:<projectId>`.
    pub namespace: String,
    /// Root directory of converted model folders.
    pub data_root: PathBuf,
    /// File name used when exporting without an explicit output path.
    pub export_file_name: String,
    /// Optional per-project blob size limit in bytes.
    pub max_blob_bytes: Option<usize>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            max_blob_bytes: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from `path`, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace cannot be empty".to_string()));
        }
        if self.namespace.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "namespace `{}` must not contain `:`",
                self.namespace
            )));
        }
        if self.export_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "exportFileName cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
