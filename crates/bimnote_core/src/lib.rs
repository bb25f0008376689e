//! Annotation core for the civil BIM viewer.
//! This crate owns annotation records, their per-project persistence and the
//! converted-model project layout. Rendering and geometry live in the viewer.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod project;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::annotation::{
    now_utc, Anchor, Annotation, AnnotationId, AnnotationKind, AnnotationPatch,
    AnnotationStatus, AnnotationValidationError, InvalidVec3, NewAnnotation, SchemaVersion,
    Severity, UnknownVariant, Vec3, Viewpoint,
};
pub use project::{ConversionMetadata, ProjectLayout, ProjectLayoutError};
pub use service::annotation_service::{AnnotationService, ImportSummary};
pub use store::annotation_store::{
    AnnotationStore, LoadOutcome, PersistOutcome, DEFAULT_NAMESPACE,
};
pub use store::blob::DecodeError;
pub use store::memory::MemoryKvStore;
pub use store::sqlite::SqliteKvStore;
pub use store::{KvStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
