//! Annotation domain model.
//!
//! # Responsibility
//! - Define the canonical annotation record persisted per project.
//! - Keep the JSON wire shape compatible with exported annotation files.
//!
//! # Invariants
//! - Every annotation is identified by an id unique within its project.
//! - Deletion is a hard delete; there are no tombstones.

pub mod annotation;
