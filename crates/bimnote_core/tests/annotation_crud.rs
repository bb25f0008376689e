use bimnote_core::{
    Anchor, AnnotationKind, AnnotationPatch, AnnotationService, AnnotationStatus, KvStore,
    MemoryKvStore, NewAnnotation, SchemaVersion, Severity, Vec3,
};
use chrono::DateTime;
use serde_json::Value;
use std::collections::HashSet;

const PROJECT_ID: &str = "test-project";

fn world_note(comment: &str) -> NewAnnotation {
    NewAnnotation {
        kind: AnnotationKind::Text,
        anchor: Anchor::world(Vec3::ORIGIN),
        author: "engineer@example.com".to_string(),
        comment: comment.to_string(),
        severity: Severity::Warning,
        status: AnnotationStatus::Open,
        viewpoint: None,
    }
}

fn service() -> AnnotationService<MemoryKvStore> {
    AnnotationService::new(MemoryKvStore::new())
}

#[test]
fn add_world_annotation_matches_input() {
    let mut service = service();
    let created = service.add(PROJECT_ID, world_note("Check this joint."));

    let listed = service.list();
    assert_eq!(listed.len(), 1);
    let stored = &listed[0];
    assert_eq!(stored, &created);
    assert!(!stored.id.is_empty());
    assert_eq!(stored.schema_version, SchemaVersion::V1_0);
    assert_eq!(stored.kind, AnnotationKind::Text);
    assert_eq!(stored.anchor, Anchor::world(Vec3::ORIGIN));
    assert_eq!(stored.author, "engineer@example.com");
    assert_eq!(stored.comment, "Check this joint.");
    assert_eq!(stored.severity, Severity::Warning);
    assert_eq!(stored.status, AnnotationStatus::Open);
    assert_eq!(stored.created_at, stored.updated_at);

    let value = serde_json::to_value(stored).unwrap();
    for field in ["createdAt", "updatedAt"] {
        let text = value[field].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(text).is_ok(), "{field}={text}");
    }
}

#[test]
fn add_persists_immediately_under_namespaced_key() {
    let mut service = service();
    service.add(
        PROJECT_ID,
        NewAnnotation {
            anchor: Anchor::object("element-42"),
            ..world_note("Crack visible.")
        },
    );

    let raw = service
        .store()
        .backend()
        .get_item("civil-bim-annotations:test-project")
        .unwrap()
        .expect("blob should exist after add");
    let parsed: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
    assert_eq!(parsed[0]["anchor"]["objectId"], "element-42");
    assert!(service.last_persist().unwrap().is_written());
}

#[test]
fn add_assigns_unique_ids() {
    let mut service = service();
    let ids: HashSet<String> = (0..50)
        .map(|i| service.add(PROJECT_ID, world_note(&format!("note {i}"))).id)
        .collect();

    assert_eq!(ids.len(), 50);
    assert_eq!(service.list().len(), 50);
}

#[test]
fn update_changes_fields_and_keeps_identity() {
    let mut service = service();
    let created = service.add(PROJECT_ID, world_note("Review needed."));

    let updated = service
        .update(
            PROJECT_ID,
            &created.id,
            AnnotationPatch {
                status: Some(AnnotationStatus::Resolved),
                severity: Some(Severity::Info),
                ..AnnotationPatch::default()
            },
        )
        .expect("annotation should exist");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.schema_version, created.schema_version);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.status, AnnotationStatus::Resolved);
    assert_eq!(updated.severity, Severity::Info);
    assert_eq!(service.get(PROJECT_ID, &created.id), Some(&updated));
}

#[test]
fn update_unknown_id_returns_none_without_persisting() {
    let mut service = service();
    service.add(PROJECT_ID, world_note("existing"));
    let before = service.list();
    let writes = service.store().backend().write_count();

    let result = service.update(
        PROJECT_ID,
        "nonexistent-id",
        AnnotationPatch {
            status: Some(AnnotationStatus::Closed),
            ..AnnotationPatch::default()
        },
    );

    assert!(result.is_none());
    assert_eq!(service.list(), before);
    assert_eq!(service.store().backend().write_count(), writes);
}

#[test]
fn delete_removes_and_reports() {
    let mut service = service();
    let created = service.add(PROJECT_ID, world_note("To delete."));

    assert!(service.delete(PROJECT_ID, &created.id));
    assert!(service.list().is_empty());

    let raw = service
        .store()
        .backend()
        .get_item("civil-bim-annotations:test-project")
        .unwrap()
        .unwrap();
    assert_eq!(raw, "[]");
}

#[test]
fn delete_unknown_id_returns_false_without_persisting() {
    let mut service = service();
    service.add(PROJECT_ID, world_note("keep"));
    let writes = service.store().backend().write_count();

    assert!(!service.delete(PROJECT_ID, "ghost-id"));
    assert_eq!(service.list().len(), 1);
    assert_eq!(service.store().backend().write_count(), writes);
}

#[test]
fn update_after_delete_returns_none() {
    let mut service = service();
    let created = service.add(PROJECT_ID, world_note("short-lived"));
    assert!(service.delete(PROJECT_ID, &created.id));

    let result = service.update(
        PROJECT_ID,
        &created.id,
        AnnotationPatch {
            comment: Some("too late".to_string()),
            ..AnnotationPatch::default()
        },
    );
    assert!(result.is_none());
}

#[test]
fn export_json_matches_list() {
    let mut service = service();
    service.add(PROJECT_ID, world_note("a"));
    service.add(PROJECT_ID, world_note("b"));

    let exported = service.export_json().unwrap();
    assert!(exported.contains("\n  {"), "export should be pretty-printed");

    let parsed: Value = serde_json::from_str(&exported).unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), service.list().len());
    assert!(items.iter().all(|item| item["schemaVersion"] == "1.0"));
}

#[test]
fn export_before_any_project_is_empty_array() {
    let service = service();
    assert_eq!(service.export_json().unwrap(), "[]");
    assert!(service.list().is_empty());
}

#[test]
fn projects_do_not_intermix() {
    let mut service = service();
    let alpha = service.add("alpha", world_note("alpha note"));
    service.add("beta", world_note("beta note"));

    assert!(service.get("beta", &alpha.id).is_none());
    assert!(!service.delete("beta", &alpha.id));
    assert_eq!(service.list_for("alpha").len(), 1);
    assert_eq!(service.list_for("beta").len(), 1);
    assert_eq!(service.stored_projects(), vec!["alpha", "beta"]);
}
