//! Annotation use-case service.
//!
//! # Responsibility
//! - Provide CRUD entry points keyed by explicit project ids.
//! - Assign ids, schema version and timestamps.
//! - Persist synchronously after every successful mutation.
//!
//! # Invariants
//! - Not-found on update/delete is a return value, never an error.
//! - `add` has no failure mode; persistence problems are logged and recorded
//!   in `last_persist`, never returned.
//! - A project whose blob cannot be read is not mutated; the refusal is
//!   recorded in `last_persist`.
//! - Reads (`list`, `get`, `export_json`) have no persistence side effects.

use crate::config::CoreConfig;
use crate::model::annotation::{now_utc, Annotation, AnnotationPatch, NewAnnotation};
use crate::store::annotation_store::{
    AnnotationStore, LoadOutcome, PersistOutcome, DEFAULT_NAMESPACE,
};
use crate::store::blob::{decode_annotations, encode_annotations, DecodeError};
use crate::store::KvStore;
use log::{debug, error, info};

/// Counts from a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub replaced: usize,
}

pub struct AnnotationService<S: KvStore> {
    store: AnnotationStore<S>,
    active_project: Option<String>,
    last_persist: Option<PersistOutcome>,
}

impl<S: KvStore> AnnotationService<S> {
    /// Creates a service over `backend` using the default namespace.
    pub fn new(backend: S) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    pub fn with_config(backend: S, config: &CoreConfig) -> Self {
        Self::with_namespace(backend, config.namespace.clone())
    }

    pub fn with_namespace(backend: S, namespace: impl Into<String>) -> Self {
        Self {
            store: AnnotationStore::new(backend, namespace),
            active_project: None,
            last_persist: None,
        }
    }

    pub fn store(&self) -> &AnnotationStore<S> {
        &self.store
    }

    pub fn into_backend(self) -> S {
        self.store.into_backend()
    }

    /// Project named by the most recent call that took a project id.
    pub fn active_project(&self) -> Option<&str> {
        self.active_project.as_deref()
    }

    /// Outcome of the most recent persist, if any mutation happened.
    pub fn last_persist(&self) -> Option<&PersistOutcome> {
        self.last_persist.as_ref()
    }

    /// Loads the project's durable blob and makes it the active project.
    ///
    /// Never fails; see `LoadOutcome` for what happened.
    pub fn load_from_durable_storage(&mut self, project_id: &str) -> LoadOutcome {
        self.activate(project_id);
        self.store.load_from_durable_storage(project_id)
    }

    /// Creates an annotation with a fresh id and persists the project.
    ///
    /// # Contract
    /// - `created_at == updated_at`.
    /// - `schema_version` is current.
    pub fn add(&mut self, project_id: &str, input: NewAnnotation) -> Annotation {
        self.activate(project_id);
        let annotation = Annotation::create(input, now_utc());
        let Some(collection) = self.store.collection_mut(project_id) else {
            self.refuse_unreadable(project_id);
            return annotation;
        };
        collection.insert(annotation.id.clone(), annotation.clone());
        info!(
            "event=annotation_add module=service project={project_id} id={} type={}",
            annotation.id, annotation.kind
        );
        self.persist(project_id);
        annotation
    }

    /// Applies a patch to an existing annotation.
    ///
    /// Returns `None` without persisting when `id` is unknown.
    pub fn update(
        &mut self,
        project_id: &str,
        id: &str,
        patch: AnnotationPatch,
    ) -> Option<Annotation> {
        self.activate(project_id);
        let Some(collection) = self.store.collection_mut(project_id) else {
            self.refuse_unreadable(project_id);
            return None;
        };
        let Some(existing) = collection.get_mut(id) else {
            debug!("event=annotation_update module=service status=not_found project={project_id} id={id}");
            return None;
        };
        existing.apply_patch(patch, now_utc());
        let updated = existing.clone();
        info!("event=annotation_update module=service status=ok project={project_id} id={id}");
        self.persist(project_id);
        Some(updated)
    }

    /// Removes an annotation. Persists only when something was removed.
    pub fn delete(&mut self, project_id: &str, id: &str) -> bool {
        self.activate(project_id);
        let Some(collection) = self.store.collection_mut(project_id) else {
            self.refuse_unreadable(project_id);
            return false;
        };
        if collection.remove(id).is_none() {
            debug!("event=annotation_delete module=service status=not_found project={project_id} id={id}");
            return false;
        }
        info!("event=annotation_delete module=service status=ok project={project_id} id={id}");
        self.persist(project_id);
        true
    }

    /// Looks up one annotation in an already loaded project.
    pub fn get(&self, project_id: &str, id: &str) -> Option<&Annotation> {
        self.store.collection(project_id)?.get(id)
    }

    /// All annotations of the active project, in unspecified order.
    pub fn list(&self) -> Vec<Annotation> {
        match self.active_project.as_deref() {
            Some(project_id) => self.list_for(project_id),
            None => Vec::new(),
        }
    }

    /// All loaded annotations of `project_id`, in unspecified order.
    pub fn list_for(&self, project_id: &str) -> Vec<Annotation> {
        self.store
            .collection(project_id)
            .map(|collection| collection.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Pretty-printed JSON array of the active project's annotations.
    pub fn export_json(&self) -> serde_json::Result<String> {
        match self.active_project.as_deref() {
            Some(project_id) => self.export_json_for(project_id),
            None => encode_annotations(std::iter::empty::<&Annotation>(), true),
        }
    }

    pub fn export_json_for(&self, project_id: &str) -> serde_json::Result<String> {
        match self.store.collection(project_id) {
            Some(collection) => encode_annotations(collection.values(), true),
            None => encode_annotations(std::iter::empty::<&Annotation>(), true),
        }
    }

    /// Merges records from an export-format JSON array.
    ///
    /// # Contract
    /// - All-or-nothing: any invalid record rejects the whole payload.
    /// - Existing ids are replaced; ids and timestamps are kept as given.
    /// - Persists once, and only when at least one record was merged.
    pub fn import_json(
        &mut self,
        project_id: &str,
        raw: &str,
    ) -> Result<ImportSummary, DecodeError> {
        self.activate(project_id);
        let records = decode_annotations(raw)?;
        let Some(collection) = self.store.collection_mut(project_id) else {
            self.refuse_unreadable(project_id);
            return Ok(ImportSummary {
                inserted: 0,
                replaced: 0,
            });
        };

        let mut summary = ImportSummary {
            inserted: 0,
            replaced: 0,
        };
        for record in records {
            match collection.insert(record.id.clone(), record) {
                Some(_) => summary.replaced += 1,
                None => summary.inserted += 1,
            }
        }

        info!(
            "event=annotations_import module=service project={project_id} inserted={} replaced={}",
            summary.inserted, summary.replaced
        );
        if summary.inserted + summary.replaced > 0 {
            self.persist(project_id);
        }
        Ok(summary)
    }

    /// Project ids with a stored blob under this service's namespace.
    pub fn stored_projects(&self) -> Vec<String> {
        self.store.stored_projects()
    }

    fn activate(&mut self, project_id: &str) {
        if self.active_project.as_deref() != Some(project_id) {
            self.active_project = Some(project_id.to_string());
        }
    }

    fn persist(&mut self, project_id: &str) {
        self.last_persist = Some(self.store.persist(project_id));
    }

    fn refuse_unreadable(&mut self, project_id: &str) {
        error!(
            "event=annotations_mutation module=service status=refused project={project_id} error_code=blob_unreadable"
        );
        self.last_persist = Some(PersistOutcome::Failed {
            reason: format!("stored annotations for `{project_id}` could not be read"),
        });
    }
}
