use bimnote_core::project::{projects_under, METADATA_FILE_NAME};
use bimnote_core::{ProjectLayout, ProjectLayoutError};
use std::fs;

const METADATA: &str = r#"{
  "schemaVersion": "1.0",
  "projectId": "bridge-01",
  "sourceFile": "bridge.ifc",
  "convertedAt": "2026-02-13T10:00:00.000Z",
  "conversionTool": "ifcconvert (IfcOpenShell)",
  "modelUrl": "model.glb"
}"#;

#[test]
fn resolves_conventional_paths() {
    let layout = ProjectLayout::new("data", "bridge-01").unwrap();

    assert_eq!(layout.project_id(), "bridge-01");
    assert!(layout.model_path().ends_with("data/bridge-01/model.glb"));
    assert!(layout.metadata_path().ends_with("data/bridge-01/metadata.json"));
}

#[test]
fn rejects_path_traversal() {
    let err = ProjectLayout::new("data", "../secrets").unwrap_err();
    assert!(matches!(err, ProjectLayoutError::InvalidProjectId(id) if id == "../secrets"));
}

#[test]
fn reads_converter_metadata() {
    let root = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(root.path(), "bridge-01").unwrap();
    fs::create_dir_all(layout.project_dir()).unwrap();
    fs::write(layout.metadata_path(), METADATA).unwrap();
    fs::write(layout.model_path(), b"glTF").unwrap();

    let metadata = layout.load_metadata().expect("metadata should load");
    assert_eq!(metadata.project_id, "bridge-01");
    assert_eq!(metadata.source_file, "bridge.ifc");
    assert_eq!(metadata.model_url, "model.glb");
    assert!(layout.has_model());
}

#[test]
fn missing_or_broken_metadata_is_soft() {
    let root = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(root.path(), "sample").unwrap();

    assert!(layout.read_metadata().unwrap().is_none());
    assert!(layout.load_metadata().is_none());
    assert!(!layout.has_model());

    fs::create_dir_all(layout.project_dir()).unwrap();
    fs::write(layout.project_dir().join(METADATA_FILE_NAME), "{").unwrap();
    assert!(matches!(
        layout.read_metadata().unwrap_err(),
        ProjectLayoutError::Metadata { .. }
    ));
    assert!(layout.load_metadata().is_none());
}

#[test]
fn lists_project_directories() {
    let root = tempfile::tempdir().unwrap();
    for name in ["bridge-01", "sample", "not valid"] {
        fs::create_dir_all(root.path().join(name)).unwrap();
    }
    fs::write(root.path().join("stray.txt"), "x").unwrap();

    assert_eq!(projects_under(root.path()), vec!["bridge-01", "sample"]);
}
