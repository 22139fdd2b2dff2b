//! Dispatcher behaviour: format selection, configuration and post-processing

mod common;

use common::*;
use scene_import::{
    FormatTag, ImportConfiguration, ImportError, NotificationType, SceneImporter, StreamSource,
    TransformFlags, Vector3,
};

#[test]
fn test_recognized_tags_without_decoder() {
    for tag in FormatTag::ALL.into_iter().filter(|t| !t.has_decoder()) {
        let err = decode_bytes(tag, minimal_3ds()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)), "{tag}");
    }
}

#[test]
fn test_decode_file_by_suffix() {
    let dir = std::env::temp_dir().join(format!("scene-import-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("TRI.3DS");
    std::fs::write(&path, minimal_3ds()).unwrap();

    let scene = SceneImporter::new().decode_file(&path).unwrap();
    assert_eq!(scene.objects[0].name, "Tri");

    let err = SceneImporter::new().decode_file(dir.join("tri.fbx")).unwrap_err();
    assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_transform_flags_post_process() {
    let config = ImportConfiguration::new()
        .transform(TransformFlags::SWAP_YZ | TransformFlags::INVERT_WINDING)
        .compute_normals(true);
    let mut source = StreamSource::from_bytes(minimal_3ds());
    let scene = SceneImporter::new()
        .with_configuration(config)
        .decode(FormatTag::Max3ds, &mut source)
        .unwrap();

    let object = &scene.objects[0];
    assert_eq!(object.vertices[2], Vector3::new(0.0, 0.0, 1.0));
    assert_eq!(object.faces[0].indices, vec![2, 1, 0]);
    assert!(object.faces[0].normal.is_some());
}

#[test]
fn test_source_position_is_reset() {
    let mut source = StreamSource::from_bytes(minimal_3ds());
    let importer = SceneImporter::new();
    let first = importer.decode(FormatTag::Max3ds, &mut source).unwrap();
    let second = importer.decode(FormatTag::Max3ds, &mut source).unwrap();
    assert_eq!(first.face_count(), second.face_count());
}

#[test]
fn test_dxf_layers_become_objects() {
    let text = "\
  0\nSECTION\n  2\nTABLES\n\
  0\nTABLE\n  2\nLAYER\n  0\nLAYER\n  2\nfloor\n 62\n3\n  0\nENDTAB\n\
  0\nENDSEC\n\
  0\nSECTION\n  2\nENTITIES\n\
  0\nSOLID\n  8\nfloor\n 10\n0\n 20\n0\n 11\n1\n 21\n0\n 12\n0\n 22\n1\n 13\n1\n 23\n1\n\
  0\nCIRCLE\n  8\nfloor\n 10\n0\n 20\n0\n 40\n1\n\
  0\nENDSEC\n\
  0\nEOF\n";
    let scene = decode_bytes(FormatTag::Dxf, text.as_bytes().to_vec()).unwrap();

    let floor = scene.object_by_name("floor").unwrap();
    // zigzag corners 1 2 3 4 become the outline 1 2 4 3
    assert_eq!(floor.vertices[2], Vector3::new(1.0, 1.0, 0.0));
    assert_eq!(floor.faces[0].indices, vec![0, 1, 2, 3]);
    assert_eq!(floor.faces[0].material, scene.material_by_name("floor"));
    assert_eq!(scene.notifications.of_type(NotificationType::Skipped).len(), 1);
}
