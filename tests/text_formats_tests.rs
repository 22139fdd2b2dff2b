//! Line-pattern decoders: PLG, OBJ, ASC and COB

mod common;

use common::*;
use proptest::prelude::*;
use scene_import::{FormatTag, ImportError, Location, NotificationType};

fn plg(text: &str) -> scene_import::Result<scene_import::Scene> {
    decode_bytes(FormatTag::Plg, text.as_bytes().to_vec())
}

#[test]
fn test_plg_objects_and_colours() {
    let scene = plg(PLG_TWO_OBJECTS).unwrap();
    assert_eq!(scene.objects.len(), 2);
    assert_eq!(scene.objects[0].faces[0].indices, vec![0, 1, 2, 3]);
    assert_eq!(scene.objects[1].vertex_count(), 3);
    assert_eq!(scene.materials().len(), 2);
}

#[test]
fn test_plg_missing_rows_names_a_line() {
    let text = PLG_TWO_OBJECTS.lines().take(8).collect::<Vec<_>>().join("\n");
    match plg(&text) {
        Err(ImportError::TruncatedInput { location, .. }) => {
            assert!(matches!(location, Location::Line(_)));
        }
        other => panic!("expected truncation, got {other:?}"),
    }
}

#[test]
fn test_plg_title_line_is_skipped() {
    let scene = plg(&format!("My PLG file\n{PLG_TWO_OBJECTS}")).unwrap();
    assert_eq!(scene.objects.len(), 2);
    assert_eq!(scene.face_count(), 2);
    let skipped = scene.notifications.of_type(NotificationType::Skipped);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].location, Location::Line(1));
}

#[test]
fn test_plg_line_polygon_kept_out_in_failsafe() {
    let text = "obj 3 2\n0 0 0\n1 0 0\n0 1 0\n0x11FF 3 0 1 2\n0x11FF 2 0 1\n";
    let scene = decode_failsafe(FormatTag::Plg, text.as_bytes().to_vec()).unwrap();
    assert_eq!(scene.face_count(), 1);
    assert!(scene.notifications.has_type(NotificationType::Skipped));
}

#[test]
fn test_obj_quad_with_texture() {
    let scene = decode_bytes(FormatTag::Obj, OBJ_QUAD.as_bytes().to_vec()).unwrap();
    let object = &scene.objects[0];
    assert_eq!(object.name, "quad");
    assert_eq!(object.faces[0].indices, vec![0, 1, 2, 3]);
    assert_eq!(object.faces[0].tex_coords, Some(vec![0, 1, 2, 3]));
    assert_eq!(object.faces[0].material, scene.material_by_name("red"));
}

#[test]
fn test_obj_unknown_lines_are_noted() {
    let text = format!("{OBJ_QUAD}bevel on\nmtllib box.mtl\n");
    let scene = decode_bytes(FormatTag::Obj, text.into_bytes()).unwrap();
    assert!(scene.notifications.has_type(NotificationType::Skipped));
    assert!(scene.notifications.has_type(NotificationType::NotSupported));
}

#[test]
fn test_asc_tri_mesh() {
    let text = "Named object: \"Tri01\"\n\
Tri-mesh, Vertices: 3 Faces: 1\n\
Vertex list:\n\
Vertex 0: X:0 Y:0 Z:0\n\
Vertex 1: X:1 Y:0 Z:0\n\
Vertex 2: X:0 Y:1 Z:0\n\
Face list:\n\
Face 0: A:0 B:1 C:2 AB:1 BC:1 CA:1\n";
    let scene = decode_bytes(FormatTag::Asc, text.as_bytes().to_vec()).unwrap();
    assert_eq!(scene.objects[0].name, "Tri01");
    assert_eq!(scene.face_count(), 1);
}

#[test]
fn test_binary_cob_unsupported() {
    let header = b"Caligari V00.01BLH             \n".to_vec();
    assert!(matches!(
        decode_bytes(FormatTag::Cob, header),
        Err(ImportError::UnsupportedFormat(_))
    ));
}

proptest! {
    /// Comment lines between any two lines leave the decoded scene unchanged
    #[test]
    fn prop_plg_comment_tolerance(after in prop::collection::vec(0usize..12, 0..6)) {
        let baseline = plg(PLG_TWO_OBJECTS).unwrap();
        let scene = plg(&with_comments(PLG_TWO_OBJECTS, &after, "#")).unwrap();

        prop_assert_eq!(scene.objects.len(), baseline.objects.len());
        for (a, b) in scene.objects.iter().zip(&baseline.objects) {
            prop_assert_eq!(&a.vertices, &b.vertices);
            prop_assert_eq!(
                a.faces.iter().map(|f| f.indices.clone()).collect::<Vec<_>>(),
                b.faces.iter().map(|f| f.indices.clone()).collect::<Vec<_>>()
            );
        }
        prop_assert!(scene.notifications.is_empty());
    }

    /// Same for OBJ, where `#` lines are comments too
    #[test]
    fn prop_obj_comment_tolerance(after in prop::collection::vec(0usize..11, 0..6)) {
        let text = with_comments(OBJ_QUAD, &after, "#");
        let scene = decode_bytes(FormatTag::Obj, text.into_bytes()).unwrap();
        prop_assert_eq!(scene.face_count(), 1);
        prop_assert_eq!(scene.vertex_count(), 4);
    }

    /// Dropping rows from the end of a counted block is truncation
    #[test]
    fn prop_plg_dropped_rows(keep in 1usize..12) {
        let text: String = PLG_TWO_OBJECTS
            .lines()
            .take(keep)
            .map(|l| format!("{l}\n"))
            .collect();
        let result = plg(&text);
        let complete_objects = [6usize, 11];
        if complete_objects.contains(&keep) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(
                matches!(result, Err(ImportError::TruncatedInput { .. })),
                "{:?}", result.err()
            );
        }
    }
}
