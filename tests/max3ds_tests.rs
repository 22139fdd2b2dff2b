//! Chunk-tree decoding of synthetic 3DS files

mod common;

use common::chunk_id::*;
use common::*;
use proptest::prelude::*;
use scene_import::{FormatTag, ImportError, Location, NotificationType};

#[test]
fn test_minimal_file() {
    let scene = decode_bytes(FormatTag::Max3ds, minimal_3ds()).unwrap();

    assert_eq!(scene.objects.len(), 1);
    assert_eq!(scene.materials().len(), 1);
    let object = &scene.objects[0];
    assert_eq!(object.name, "Tri");
    assert_eq!(object.vertex_count(), 3);
    assert_eq!(object.face_count(), 1);
    assert_eq!(object.faces[0].material, scene.material_by_name("RED"));
    assert!(scene.notifications.is_empty());
}

#[test]
fn test_unknown_chunk_between_known_chunks() {
    let mut editor = material_chunk("RED", [255, 0, 0]);
    editor.extend(chunk(UNKNOWN, &[0xAB; 13]));
    editor.extend(mesh_object("Tri", &TRIANGLE, &[[0, 1, 2]], Some("RED")));
    let scene = decode_bytes(FormatTag::Max3ds, file_3ds(&editor)).unwrap();

    assert_eq!(scene.objects.len(), 1);
    assert_eq!(scene.objects[0].faces[0].material, scene.material_by_name("RED"));
    let skipped = scene.notifications.of_type(NotificationType::Skipped);
    assert_eq!(skipped.len(), 1);
    assert!(matches!(skipped[0].location, Location::Offset(_)));
}

#[test]
fn test_chunk_longer_than_file() {
    let mut file = minimal_3ds();
    file.truncate(file.len() - 10);
    assert!(matches!(
        decode_bytes(FormatTag::Max3ds, file),
        Err(ImportError::TruncatedInput { .. })
    ));
}

#[test]
fn test_zero_length_container() {
    // editor chunk declaring a length smaller than its own header
    let mut main = chunk(M3D_VERSION, &3u32.to_le_bytes());
    main.extend_from_slice(&EDIT3DS.to_le_bytes());
    main.extend_from_slice(&0u32.to_le_bytes());
    main.extend_from_slice(&[0; 8]);
    let err = decode_bytes(FormatTag::Max3ds, chunk(MAIN3DS, &main)).unwrap_err();
    assert!(matches!(err, ImportError::Malformed { .. }));
    assert!(err.is_structural());
}

#[test]
fn test_failsafe_keeps_valid_faces() {
    let faces = [[0, 1, 2], [0, 1, 9]];
    let file = file_3ds(&mesh_object("Tri", &TRIANGLE, &faces, None));

    assert!(matches!(
        decode_bytes(FormatTag::Max3ds, file.clone()),
        Err(ImportError::UnresolvedReference { .. })
    ));
    let scene = decode_failsafe(FormatTag::Max3ds, file).unwrap();
    assert_eq!(scene.objects[0].face_count(), 1);
    assert!(scene.notifications.has_type(NotificationType::Error));
}

proptest! {
    /// Unknown chunks of any size are skipped by length, each noted once
    #[test]
    fn prop_unknown_chunks_skipped(sizes in prop::collection::vec(0usize..64, 0..8)) {
        let mut editor = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            editor.extend(chunk(UNKNOWN, &vec![i as u8; *size]));
            editor.extend(mesh_object(&format!("T{i}"), &TRIANGLE, &[[0, 1, 2]], None));
        }
        let scene = decode_bytes(FormatTag::Max3ds, file_3ds(&editor)).unwrap();

        prop_assert_eq!(scene.objects.len(), sizes.len());
        prop_assert_eq!(
            scene.notifications.of_type(NotificationType::Skipped).len(),
            sizes.len()
        );
    }

    /// Any cut through the file is reported as truncation or bad framing,
    /// never as a partial scene
    #[test]
    fn prop_cut_file_is_rejected(cut in 1usize..64) {
        let mut file = minimal_3ds();
        let keep = file.len().saturating_sub(cut);
        file.truncate(keep);
        let err = decode_bytes(FormatTag::Max3ds, file).unwrap_err();
        prop_assert!(err.is_structural(), "{}", err);
    }

    /// Every decoded face index is below its object's vertex count
    #[test]
    fn prop_face_indices_in_bounds(
        vertex_count in 3usize..12,
        faces in prop::collection::vec([0u16..16, 0u16..16, 0u16..16], 1..10),
    ) {
        let vertices: Vec<[f32; 3]> = (0..vertex_count).map(|i| [i as f32, 0.0, 0.0]).collect();
        let file = file_3ds(&mesh_object("Fan", &vertices, &faces, None));
        let valid = faces
            .iter()
            .filter(|f| f.iter().all(|&i| (i as usize) < vertex_count))
            .count();

        let strict = decode_bytes(FormatTag::Max3ds, file.clone());
        prop_assert_eq!(strict.is_ok(), valid == faces.len());

        let scene = decode_failsafe(FormatTag::Max3ds, file).unwrap();
        let object = &scene.objects[0];
        prop_assert_eq!(object.face_count(), valid);
        for face in &object.faces {
            prop_assert!(face.indices.iter().all(|&i| i < object.vertex_count()));
        }
    }
}
