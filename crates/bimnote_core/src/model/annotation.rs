//! Annotation domain model.
//!
//! # Responsibility
//! - Define the persisted annotation record and its JSON wire shape.
//! - Provide creation, patch and validation helpers used by the store.
//!
//! # Invariants
//! - `id` is stable and never reused for another annotation in a project.
//! - `schema_version` is always the current version for records created here.
//! - `updated_at` is never earlier than `created_at`.
//! - Anchor payload is exactly one of object reference or world position.
//! - Timestamps hold millisecond precision in memory, matching their JSON form.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Opaque annotation identifier.
///
/// Records created by this crate use UUID v4 text; imported records may carry
/// any non-empty string.
pub type AnnotationId = String;

/// Record schema tag written into every annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[default]
    #[serde(rename = "1.0")]
    V1_0,
}

impl SchemaVersion {
    pub const CURRENT: Self = Self::V1_0;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
        }
    }
}

/// Annotation category, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Free text note.
    Text,
    /// Distance or area measurement.
    Measurement,
    /// Freehand or shape markup.
    Markup,
}

/// Severity levels following common BCF conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Issue workflow status. Any value may replace any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

/// Finite 3-component vector in world coordinates.
///
/// Non-finite components are rejected at construction because they have no
/// JSON representation and would corrupt the persisted blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3([f64; 3]);

impl Vec3 {
    pub const ORIGIN: Self = Self([0.0, 0.0, 0.0]);

    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, InvalidVec3> {
        Self::try_from([x, y, z])
    }

    pub fn coords(&self) -> [f64; 3] {
        self.0
    }
}

impl TryFrom<[f64; 3]> for Vec3 {
    type Error = InvalidVec3;

    fn try_from(value: [f64; 3]) -> Result<Self, Self::Error> {
        if let Some(axis) = value.iter().position(|component| !component.is_finite()) {
            return Err(InvalidVec3 { axis });
        }
        Ok(Self(value))
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(value: Vec3) -> Self {
        value.0
    }
}

/// Rejected non-finite vector component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidVec3 {
    /// Zero-based index of the first offending component.
    pub axis: usize,
}

impl Display for InvalidVec3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "vector component {} is not a finite number", self.axis)
    }
}

impl Error for InvalidVec3 {}

/// Binds an annotation to a viewer object or a fixed world position.
///
/// Serialized with an internal `type` tag to match the stored wire shape:
/// `{"type":"object","objectId":"..."}` or `{"type":"world","worldPos":[x,y,z]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Anchor {
    Object {
        #[serde(rename = "objectId")]
        object_id: String,
    },
    World {
        #[serde(rename = "worldPos")]
        world_pos: Vec3,
    },
}

impl Anchor {
    pub fn object(object_id: impl Into<String>) -> Self {
        Self::Object {
            object_id: object_id.into(),
        }
    }

    pub fn world(world_pos: Vec3) -> Self {
        Self::World { world_pos }
    }
}

/// Camera pose captured for reproducing the annotated view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewpoint {
    pub eye: Vec3,
    pub look: Vec3,
    pub up: Vec3,
    #[serde(default)]
    pub selected_objects: Vec<String>,
}

/// Persisted annotation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub schema_version: SchemaVersion,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub anchor: Anchor,
    pub author: String,
    #[serde(with = "iso8601_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso8601_millis")]
    pub updated_at: DateTime<Utc>,
    pub comment: String,
    pub severity: Severity,
    pub status: AnnotationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewpoint: Option<Viewpoint>,
}

/// Caller payload for creating an annotation.
///
/// Carries every field except the ones assigned at creation
/// (`id`, timestamps, `schema_version`).
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub kind: AnnotationKind,
    pub anchor: Anchor,
    pub author: String,
    pub comment: String,
    pub severity: Severity,
    pub status: AnnotationStatus,
    pub viewpoint: Option<Viewpoint>,
}

/// Closed set of fields an update may replace.
///
/// `None` leaves the field untouched. `viewpoint: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub anchor: Option<Anchor>,
    pub author: Option<String>,
    pub comment: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<AnnotationStatus>,
    pub viewpoint: Option<Option<Viewpoint>>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.anchor.is_none()
            && self.author.is_none()
            && self.comment.is_none()
            && self.severity.is_none()
            && self.status.is_none()
            && self.viewpoint.is_none()
    }
}

/// Validation failures for annotation invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValidationError {
    EmptyId,
    UpdatedBeforeCreated {
        id: AnnotationId,
    },
}

impl Display for AnnotationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "annotation id must not be empty"),
            Self::UpdatedBeforeCreated { id } => {
                write!(f, "annotation {id} has updatedAt earlier than createdAt")
            }
        }
    }
}

impl Error for AnnotationValidationError {}

impl Annotation {
    /// Creates a record from a caller payload with a fresh id.
    ///
    /// # Invariants
    /// - `created_at == updated_at == now`.
    /// - `schema_version` is `SchemaVersion::CURRENT`.
    pub fn create(input: NewAnnotation, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_version: SchemaVersion::CURRENT,
            kind: input.kind,
            anchor: input.anchor,
            author: input.author,
            created_at: now,
            updated_at: now,
            comment: input.comment,
            severity: input.severity,
            status: input.status,
            viewpoint: input.viewpoint,
        }
    }

    /// Applies a patch and refreshes `updated_at`.
    ///
    /// `updated_at` is refreshed even for an empty patch and never moves
    /// backwards, even when the wall clock does.
    pub fn apply_patch(&mut self, patch: AnnotationPatch, now: DateTime<Utc>) {
        if let Some(anchor) = patch.anchor {
            self.anchor = anchor;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(comment) = patch.comment {
            self.comment = comment;
        }
        if let Some(severity) = patch.severity {
            self.severity = severity;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(viewpoint) = patch.viewpoint {
            self.viewpoint = viewpoint;
        }
        self.updated_at = now.max(self.updated_at);
    }

    /// Checks invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), AnnotationValidationError> {
        if self.id.trim().is_empty() {
            return Err(AnnotationValidationError::EmptyId);
        }
        if self.updated_at < self.created_at {
            return Err(AnnotationValidationError::UpdatedBeforeCreated {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Current UTC time truncated to the millisecond precision of the wire format.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Unrecognized textual enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl Display for UnknownVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown {} `{}`; expected {}",
            self.field, self.value, self.expected
        )
    }
}

impl Error for UnknownVariant {}

macro_rules! wire_names {
    ($ty:ty, $field:literal, $expected:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(UnknownVariant {
                        field: $field,
                        value: other.to_string(),
                        expected: $expected,
                    }),
                }
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_names!(AnnotationKind, "annotation type", "text|measurement|markup", {
    AnnotationKind::Text => "text",
    AnnotationKind::Measurement => "measurement",
    AnnotationKind::Markup => "markup",
});

wire_names!(Severity, "severity", "info|warning|error|critical", {
    Severity::Info => "info",
    Severity::Warning => "warning",
    Severity::Error => "error",
    Severity::Critical => "critical",
});

wire_names!(AnnotationStatus, "status", "open|in-progress|resolved|closed", {
    AnnotationStatus::Open => "open",
    AnnotationStatus::InProgress => "in-progress",
    AnnotationStatus::Resolved => "resolved",
    AnnotationStatus::Closed => "closed",
});

/// ISO-8601 UTC timestamps with millisecond precision and a `Z` suffix.
///
/// Reads any RFC 3339 offset, normalizes it to UTC and drops sub-millisecond
/// digits so a decoded value re-encodes to the same instant.
mod iso8601_millis {
    use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc).trunc_subsecs(3))
            .map_err(|err| serde::de::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_input() -> NewAnnotation {
        NewAnnotation {
            kind: AnnotationKind::Text,
            anchor: Anchor::world(Vec3::ORIGIN),
            author: "engineer@example.com".to_string(),
            comment: "Check this joint.".to_string(),
            severity: Severity::Warning,
            status: AnnotationStatus::Open,
            viewpoint: None,
        }
    }

    #[test]
    fn apply_patch_never_moves_updated_at_backwards() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut annotation = Annotation::create(sample_input(), created);

        let skewed = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        annotation.apply_patch(AnnotationPatch::default(), skewed);

        assert_eq!(annotation.updated_at, created);
        assert!(annotation.validate().is_ok());
    }

    #[test]
    fn vec3_rejects_non_finite_components() {
        let err = Vec3::new(0.0, f64::NAN, 1.0).unwrap_err();
        assert_eq!(err.axis, 1);
        assert!(Vec3::new(1.0, 2.0, f64::INFINITY).is_err());
    }

    #[test]
    fn status_parses_wire_names_case_insensitively() {
        assert_eq!(
            " In-Progress ".parse::<AnnotationStatus>().unwrap(),
            AnnotationStatus::InProgress
        );
        let err = "done".parse::<AnnotationStatus>().unwrap_err();
        assert!(err.to_string().contains("open|in-progress|resolved|closed"));
    }

    #[test]
    fn decoded_timestamps_drop_sub_millisecond_digits() {
        let mut value = serde_json::to_value(Annotation::create(sample_input(), now_utc())).unwrap();
        value["createdAt"] = "2026-02-13T10:00:00.000400Z".into();
        value["updatedAt"] = "2026-02-13T11:00:00.123900+01:00".into();

        let decoded: Annotation = serde_json::from_value(value).unwrap();
        assert_eq!(
            decoded.created_at,
            Utc.with_ymd_and_hms(2026, 2, 13, 10, 0, 0).unwrap()
        );
        assert_eq!(decoded.updated_at.timestamp_subsec_nanos(), 123_000_000);
        let reencoded: Annotation =
            serde_json::from_str(&serde_json::to_string(&decoded).unwrap()).unwrap();
        assert_eq!(reencoded, decoded);
    }

    #[test]
    fn now_utc_has_millisecond_precision() {
        let now = now_utc();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
