//! Converted-model project layout.
//!
//! # Responsibility
//! - Resolve where the offline conversion step places a project's files.
//! - Read the conversion metadata descriptor written next to the model.
//!
//! # Invariants
//! - Project ids are single safe path segments; traversal is rejected.
//! - Metadata loading is soft: a missing or broken descriptor is logged and
//!   reported as absent, never as a hard failure.

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const MODEL_FILE_NAME: &str = "model.glb";
pub const METADATA_FILE_NAME: &str = "metadata.json";

static PROJECT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("valid project id regex"));

#[derive(Debug)]
pub enum ProjectLayoutError {
    InvalidProjectId(String),
    Io { path: PathBuf, source: std::io::Error },
    Metadata { path: PathBuf, source: serde_json::Error },
}

impl Display for ProjectLayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProjectId(value) => write!(
                f,
                "invalid project id `{value}`; expected letters, digits, `.`, `_` or `-`"
            ),
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Metadata { path, source } => {
                write!(f, "invalid metadata `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ProjectLayoutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidProjectId(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Metadata { source, .. } => Some(source),
        }
    }
}

/// Descriptor written by the conversion step next to `model.glb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionMetadata {
    pub schema_version: String,
    pub project_id: String,
    pub source_file: String,
    /// ISO-8601 conversion time as written by the converter.
    pub converted_at: String,
    pub conversion_tool: String,
    /// Model path relative to the project directory.
    pub model_url: String,
}

/// File locations for one converted project: `<root>/<projectId>/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    data_root: PathBuf,
    project_id: String,
}

impl ProjectLayout {
    pub fn new(
        data_root: impl Into<PathBuf>,
        project_id: &str,
    ) -> Result<Self, ProjectLayoutError> {
        validate_project_id(project_id)?;
        Ok(Self {
            data_root: data_root.into(),
            project_id: project_id.to_string(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_dir(&self) -> PathBuf {
        self.data_root.join(&self.project_id)
    }

    pub fn model_path(&self) -> PathBuf {
        self.project_dir().join(MODEL_FILE_NAME)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.project_dir().join(METADATA_FILE_NAME)
    }

    /// Reads the metadata descriptor; `Ok(None)` when the file is absent.
    pub fn read_metadata(&self) -> Result<Option<ConversionMetadata>, ProjectLayoutError> {
        let path = self.metadata_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ProjectLayoutError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ProjectLayoutError::Metadata { path, source })
    }

    /// Soft variant of [`read_metadata`](Self::read_metadata) for viewer startup.
    pub fn load_metadata(&self) -> Option<ConversionMetadata> {
        match self.read_metadata() {
            Ok(Some(metadata)) => {
                info!(
                    "event=project_metadata module=project status=ok project={} tool={}",
                    self.project_id, metadata.conversion_tool
                );
                Some(metadata)
            }
            Ok(None) => {
                warn!(
                    "event=project_metadata module=project status=missing project={} path={}",
                    self.project_id,
                    self.metadata_path().display()
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=project_metadata module=project status=error project={} error={err}",
                    self.project_id
                );
                None
            }
        }
    }

    /// Whether the converted model file exists on disk.
    pub fn has_model(&self) -> bool {
        self.model_path().is_file()
    }
}

pub fn validate_project_id(project_id: &str) -> Result<(), ProjectLayoutError> {
    if PROJECT_ID_RE.is_match(project_id) && !project_id.contains("..") {
        return Ok(());
    }
    Err(ProjectLayoutError::InvalidProjectId(project_id.to_string()))
}

/// Lists converted project ids found under `data_root`, sorted.
pub fn projects_under(data_root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(data_root) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| validate_project_id(name).is_ok())
        .collect();
    ids.sort();
    ids
}
