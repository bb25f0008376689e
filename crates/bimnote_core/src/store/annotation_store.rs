//! Per-project annotation collections with write-through persistence.
//!
//! # Responsibility
//! - Hold each touched project's records in memory, keyed by id.
//! - Mirror a project's collection into its durable blob on request.
//!
//! # Invariants
//! - Durable key format is `<namespace>:<projectId>`.
//! - Loading never fails: missing, malformed or unreadable blobs leave the
//!   in-memory collection untouched.
//! - A project whose blob could not be read stays unloaded, so no write
//!   replaces that blob with a partial collection.
//! - Persisting always rewrites the full blob; it never patches in place.

use super::blob::{decode_annotations, encode_annotations};
use super::KvStore;
use crate::model::annotation::{Annotation, AnnotationId};
use log::{error, info, warn};
use std::collections::HashMap;

/// Default durable key namespace.
pub const DEFAULT_NAMESPACE: &str = "civil-bim-annotations";

pub type Collection = HashMap<AnnotationId, Annotation>;

/// Result of reading a project's durable blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No blob stored for the project.
    Missing,
    /// Blob replaced the in-memory collection.
    Loaded { records: usize },
    /// Blob present but rejected; collection unchanged.
    Malformed,
    /// Backend read failed; collection unchanged, project not marked loaded.
    Unavailable,
}

/// Result of writing a project's durable blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written { records: usize, bytes: usize },
    Failed { reason: String },
}

impl PersistOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

pub struct AnnotationStore<S: KvStore> {
    backend: S,
    namespace: String,
    projects: HashMap<String, Collection>,
}

impl<S: KvStore> AnnotationStore<S> {
    pub fn new(backend: S, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            projects: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn storage_key(&self, project_id: &str) -> String {
        format!("{}:{project_id}", self.namespace)
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    /// Whether the project has been loaded or touched in this process.
    pub fn is_loaded(&self, project_id: &str) -> bool {
        self.projects.contains_key(project_id)
    }

    pub fn collection(&self, project_id: &str) -> Option<&Collection> {
        self.projects.get(project_id)
    }

    /// Returns the project's collection, loading it first when untouched.
    ///
    /// `None` when the project is unloaded and its blob cannot be read.
    pub fn collection_mut(&mut self, project_id: &str) -> Option<&mut Collection> {
        if !self.is_loaded(project_id)
            && self.load_from_durable_storage(project_id) == LoadOutcome::Unavailable
        {
            return None;
        }
        self.projects.get_mut(project_id)
    }

    /// Reads the project's blob into memory.
    ///
    /// # Invariants
    /// - A valid blob replaces the project's collection.
    /// - Any failure is logged and leaves the collection as it was.
    pub fn load_from_durable_storage(&mut self, project_id: &str) -> LoadOutcome {
        let key = self.storage_key(project_id);

        let raw = match self.backend.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.projects.entry(project_id.to_string()).or_default();
                info!("event=annotations_load module=store status=missing project={project_id}");
                return LoadOutcome::Missing;
            }
            Err(err) => {
                warn!(
                    "event=annotations_load module=store status=error project={project_id} error_code=backend_read_failed error={err}"
                );
                return LoadOutcome::Unavailable;
            }
        };

        match decode_annotations(&raw) {
            Ok(records) => {
                let count = records.len();
                let collection = records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect();
                self.projects.insert(project_id.to_string(), collection);
                info!(
                    "event=annotations_load module=store status=ok project={project_id} records={count}"
                );
                LoadOutcome::Loaded { records: count }
            }
            Err(err) => {
                self.projects.entry(project_id.to_string()).or_default();
                warn!(
                    "event=annotations_load module=store status=malformed project={project_id} bytes={} error={err}",
                    raw.len()
                );
                LoadOutcome::Malformed
            }
        }
    }

    /// Overwrites the project's blob with its full in-memory collection.
    ///
    /// Refuses projects that were never loaded. Backend failures are logged and reported, never propagated.
    pub fn persist(&mut self, project_id: &str) -> PersistOutcome {
        let key = self.storage_key(project_id);
        let Some(collection) = self.projects.get(project_id) else {
            return persist_failed(
                project_id,
                "project_not_loaded",
                format!("annotations for `{project_id}` were never read; refusing to overwrite"),
            );
        };
        let records = collection.len();

        let encoded = match encode_annotations(collection.values(), false) {
            Ok(encoded) => encoded,
            Err(err) => return persist_failed(project_id, "encode_failed", err.to_string()),
        };

        match self.backend.set_item(&key, &encoded) {
            Ok(()) => {
                info!(
                    "event=annotations_persist module=store status=ok project={project_id} records={records} bytes={}",
                    encoded.len()
                );
                PersistOutcome::Written {
                    records,
                    bytes: encoded.len(),
                }
            }
            Err(err) => persist_failed(project_id, "backend_write_failed", err.to_string()),
        }
    }

    /// Lists project ids that have a blob under this namespace.
    pub fn stored_projects(&self) -> Vec<String> {
        let prefix = format!("{}:", self.namespace);
        match self.backend.keys_with_prefix(&prefix) {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
                .collect(),
            Err(err) => {
                warn!("event=annotations_projects module=store status=error error={err}");
                Vec::new()
            }
        }
    }
}

fn persist_failed(project_id: &str, code: &str, reason: String) -> PersistOutcome {
    error!(
        "event=annotations_persist module=store status=error project={project_id} error_code={code} error={reason}"
    );
    PersistOutcome::Failed { reason }
}
