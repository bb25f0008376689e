//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep CLI and UI callers decoupled from storage details.

pub mod annotation_service;
