//! Blob codec for a project's annotation collection.
//!
//! # Invariants
//! - A blob is a JSON array of annotation records.
//! - Decoding is all-or-nothing: one bad record rejects the whole blob.
//! - Encoded records are ordered by `createdAt`, then `id`.

use crate::model::annotation::{Annotation, AnnotationId, AnnotationValidationError};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected blob or import payload.
#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    Invalid {
        index: usize,
        source: AnnotationValidationError,
    },
    DuplicateId(AnnotationId),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed annotation json: {err}"),
            Self::Invalid { index, source } => write!(f, "record {index}: {source}"),
            Self::DuplicateId(id) => write!(f, "duplicate annotation id `{id}`"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Invalid { source, .. } => Some(source),
            Self::DuplicateId(_) => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Parses and validates a serialized annotation array.
pub fn decode_annotations(raw: &str) -> Result<Vec<Annotation>, DecodeError> {
    let records: Vec<Annotation> = serde_json::from_str(raw)?;
    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        record
            .validate()
            .map_err(|source| DecodeError::Invalid { index, source })?;
        if !seen.insert(record.id.as_str()) {
            return Err(DecodeError::DuplicateId(record.id.clone()));
        }
    }
    Ok(records)
}

/// Serializes records in a stable order.
///
/// `pretty` selects the two-space indented export layout.
pub fn encode_annotations<'a>(
    records: impl IntoIterator<Item = &'a Annotation>,
    pretty: bool,
) -> serde_json::Result<String> {
    let mut ordered: Vec<&Annotation> = records.into_iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    if pretty {
        serde_json::to_string_pretty(&ordered)
    } else {
        serde_json::to_string(&ordered)
    }
}
