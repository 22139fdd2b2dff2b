//! 3D Studio ASCII export (.asc) decoder
//!
//! ```text
//! Named object: "Box01"
//! Tri-mesh, Vertices: 3     Faces: 1
//! Vertex list:
//! Vertex 0:  X:0.0  Y:0.0  Z:0.0  U:0.0 V:0.0
//! ...
//! Face list:
//! Face 0:    A:0 B:1 C:2 AB:1 BC:1 CA:1
//! Material:"RED"
//! Smoothing:  1
//! ```
//!
//! `Material` and `Smoothing` lines apply to the face row before them.
//! Lights, cameras and anything else unrecognized is skipped.

use super::{field, labelled_fields, unquote, LineCursor, PatternSet};
use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::notification::NotificationType;
use crate::scene::{Face, FaceFlags, FaceIndex, Material, SceneBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    NamedObject,
    TriMesh,
    VertexList,
    Vertex,
    FaceList,
    Face,
    Material,
    Smoothing,
}

fn patterns() -> PatternSet<Line> {
    PatternSet::new()
        .keyword("Named object:", Line::NamedObject)
        .keyword("Tri-mesh,", Line::TriMesh)
        .keyword("Vertex list:", Line::VertexList)
        .keyword("Vertex", Line::Vertex)
        .keyword("Face list:", Line::FaceList)
        .keyword("Face", Line::Face)
        .keyword("Material:", Line::Material)
        .keyword("Smoothing:", Line::Smoothing)
}

/// Decoder for 3D Studio ASCII scenes
#[derive(Debug, Default)]
pub struct AscDecoder {
    object_name: Option<String>,
}

impl AscDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_mesh(
        &mut self,
        counts: &str,
        cursor: &mut LineCursor<'_>,
        patterns: &PatternSet<Line>,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        let fields = labelled_fields(counts);
        let vertices = count(&fields, "Vertices", cursor.location())?;
        let faces = count(&fields, "Faces", cursor.location())?;
        let name = self.object_name.take().unwrap_or_else(|| "Object".to_string());
        builder.begin_object(&name);

        // a section keyword other than a row kind ends the block
        let stop = |text: &str| match patterns.classify(text) {
            Some((Line::Vertex, _)) | Some((Line::Face, _)) | None => false,
            Some(_) => true,
        };

        expect_header(cursor, patterns, Line::VertexList, builder)?;
        let rows = cursor.read_rows(vertices, "vertex list", stop, |text| {
            let (kind, rest) = patterns.classify(text)?;
            if kind != Line::Vertex {
                return None;
            }
            parse_vertex(rest)
        })?;
        let textured = rows.iter().all(|(_, uv)| uv.is_some()) && !rows.is_empty();
        for (p, uv) in &rows {
            builder.add_vertex(p[0], p[1], p[2]);
            if let (true, Some((u, v))) = (textured, uv) {
                builder.add_texture_point(*u, *v);
            }
        }

        if faces == 0 {
            return Ok(());
        }
        expect_header(cursor, patterns, Line::FaceList, builder)?;
        let mut read = 0;
        let mut last: Option<FaceIndex> = None;
        while read < faces || last.is_some() {
            let Some(text) = cursor.next_line()? else {
                if read < faces {
                    return Err(ImportError::truncated(
                        cursor.location(),
                        format!("face list: {faces} rows declared, {read} present"),
                    ));
                }
                break;
            };
            match patterns.classify(&text) {
                Some((Line::Face, rest)) if read < faces => {
                    let location = cursor.location();
                    let mut face = parse_face(rest).ok_or_else(|| {
                        ImportError::malformed(location, format!("face list: cannot parse '{text}'"))
                    })?;
                    if textured {
                        face.tex_coords = Some(face.indices.clone());
                    }
                    read += 1;
                    last = match builder.add_face(face) {
                        Ok(index) => Some(index),
                        Err(err) => {
                            builder.recover(Err(err), location)?;
                            None
                        }
                    };
                }
                Some((Line::Material, rest)) => {
                    let name = unquote(rest).to_string();
                    let material = match builder.material_by_name(&name) {
                        Some(id) => id,
                        None => builder.add_material_def(Material::new(name)),
                    };
                    if let Some(face) = last {
                        builder.set_face_material(face, material)?;
                    }
                }
                Some((Line::Smoothing, rest)) => {
                    if let Some(face) = last {
                        builder.set_face_smoothing(face, smoothing_mask(rest))?;
                    }
                }
                Some(_) if read < faces => {
                    cursor.push_back(text);
                    return Err(ImportError::truncated(
                        cursor.location(),
                        format!("face list: {faces} rows declared, {read} present"),
                    ));
                }
                Some(_) => {
                    cursor.push_back(text);
                    break;
                }
                None => builder.notify(
                    NotificationType::Skipped,
                    cursor.location(),
                    format!("unrecognized line '{text}'"),
                ),
            }
        }
        Ok(())
    }
}

/// Skip to the `Vertex list:`/`Face list:` header, tolerating free text
fn expect_header(
    cursor: &mut LineCursor<'_>,
    patterns: &PatternSet<Line>,
    wanted: Line,
    builder: &mut SceneBuilder<'_>,
) -> Result<()> {
    while let Some(text) = cursor.next_line()? {
        match patterns.classify(&text) {
            Some((kind, _)) if kind == wanted => return Ok(()),
            Some(_) => {
                // rows without their list header
                cursor.push_back(text);
                return Ok(());
            }
            None => builder.notify(
                NotificationType::Skipped,
                cursor.location(),
                format!("unrecognized line '{text}'"),
            ),
        }
    }
    Err(ImportError::truncated(
        cursor.location(),
        format!("missing {wanted:?} section"),
    ))
}

fn count(fields: &[(&str, &str)], label: &str, location: Location) -> Result<usize> {
    field(fields, label)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ImportError::malformed(location, format!("Tri-mesh without {label} count")))
}

type VertexRow = ([f64; 3], Option<(f64, f64)>);

fn parse_vertex(rest: &str) -> Option<VertexRow> {
    let fields = labelled_fields(rest);
    let num = |label: &str| field(&fields, label).and_then(|v| v.parse::<f64>().ok());
    let position = [num("X")?, num("Y")?, num("Z")?];
    let uv = num("U").zip(num("V"));
    Some((position, uv))
}

fn parse_face(rest: &str) -> Option<Face> {
    let fields = labelled_fields(rest);
    let index = |label: &str| field(&fields, label).and_then(|v| v.parse::<usize>().ok());
    let mut face = Face::triangle(index("A")?, index("B")?, index("C")?);
    let visible = |label: &str| field(&fields, label).map(|v| v != "0").unwrap_or(true);
    let mut flags = FaceFlags::empty();
    flags.set(FaceFlags::EDGE_AB_VISIBLE, visible("AB"));
    flags.set(FaceFlags::EDGE_BC_VISIBLE, visible("BC"));
    flags.set(FaceFlags::EDGE_CA_VISIBLE, visible("CA"));
    face.flags = flags;
    Some(face)
}

/// Smoothing groups are listed 1-based; group n sets bit n-1
fn smoothing_mask(rest: &str) -> u32 {
    super::tokens(rest)
        .filter_map(|t| t.parse::<u32>().ok())
        .filter(|&n| (1..=32).contains(&n))
        .fold(0, |mask, n| mask | 1 << (n - 1))
}

impl Decoder for AscDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Asc
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        let patterns = patterns();
        let mut cursor = LineCursor::new(source, &[]);

        while let Some(text) = cursor.next_line()? {
            match patterns.classify(&text) {
                Some((Line::NamedObject, rest)) => {
                    self.object_name = Some(unquote(rest).to_string());
                }
                Some((Line::TriMesh, rest)) => {
                    let rest = rest.to_string();
                    self.read_mesh(&rest, &mut cursor, &patterns, builder)?;
                }
                _ => builder.notify(
                    NotificationType::Skipped,
                    cursor.location(),
                    format!("unrecognized line '{text}'"),
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::StreamSource;
    use crate::scene::{DefaultSceneFactory, Scene};

    const BOX: &str = "Ambient light color: Red=0.3 Green=0.3 Blue=0.3\n\
\n\
Named object: \"Tri01\"\n\
Tri-mesh, Vertices: 4     Faces: 2\n\
Vertex list:\n\
Vertex 0:  X:0.0     Y:0.0     Z:0.0\n\
Vertex 1:  X: 1.0    Y:0.0     Z:0.0\n\
Vertex 2:  X:1.0     Y:1.0     Z:0.0\n\
Vertex 3:  X:0.0     Y:1.0     Z:0.0\n\
Face list:\n\
Face 0:    A:0 B:1 C:2 AB:1 BC:1 CA:0\n\
Material:\"RED\"\n\
Smoothing:  1, 3\n\
Face 1:    A:0 B:2 C:3 AB:0 BC:1 CA:1\n\
Material:\"RED\"\n\
\n\
Direct light\n";

    fn decode_str(text: &str) -> Result<Scene> {
        let factory = DefaultSceneFactory;
        let mut builder = SceneBuilder::new(&factory);
        let mut source = StreamSource::from_bytes(text.as_bytes().to_vec());
        AscDecoder::new().decode(&mut source, &mut builder)?;
        builder.finish()
    }

    #[test]
    fn test_named_tri_mesh() {
        let scene = decode_str(BOX).unwrap();
        assert_eq!(scene.objects.len(), 1);
        let object = &scene.objects[0];
        assert_eq!(object.name, "Tri01");
        assert_eq!(object.vertices.len(), 4);
        assert_eq!(object.faces.len(), 2);
        assert_eq!(object.faces[1].indices, vec![0, 2, 3]);

        let red = scene.material_by_name("RED").unwrap();
        assert_eq!(scene.materials().len(), 1);
        assert!(object.faces.iter().all(|f| f.material == Some(red)));
        assert_eq!(object.faces[0].smoothing_group, 0b101);
        assert!(!object.faces[0].flags.contains(FaceFlags::EDGE_CA_VISIBLE));
        assert!(scene.notifications.has_type(NotificationType::Skipped));
    }

    #[test]
    fn test_uv_vertices() {
        let text = "Tri-mesh, Vertices: 3 Faces: 1\nVertex list:\n\
Vertex 0: X:0 Y:0 Z:0 U:0 V:0\nVertex 1: X:1 Y:0 Z:0 U:1 V:0\nVertex 2: X:0 Y:1 Z:0 U:0 V:1\n\
Face list:\nFace 0: A:0 B:1 C:2 AB:1 BC:1 CA:1\n";
        let scene = decode_str(text).unwrap();
        let object = &scene.objects[0];
        assert_eq!(object.tex_points.len(), 3);
        assert_eq!(object.faces[0].tex_coords, Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_missing_vertex_rows() {
        let text = "Named object: \"A\"\nTri-mesh, Vertices: 3 Faces: 1\nVertex list:\n\
Vertex 0: X:0 Y:0 Z:0\nFace list:\nFace 0: A:0 B:1 C:2\n";
        assert!(matches!(decode_str(text), Err(ImportError::TruncatedInput { .. })));
    }

    #[test]
    fn test_bad_vertex_index() {
        let text = "Tri-mesh, Vertices: 3 Faces: 1\nVertex list:\n\
Vertex 0: X:0 Y:0 Z:0\nVertex 1: X:1 Y:0 Z:0\nVertex 2: X:0 Y:1 Z:0\n\
Face list:\nFace 0: A:0 B:1 C:7\n";
        assert!(matches!(
            decode_str(text),
            Err(ImportError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_smoothing_mask() {
        assert_eq!(smoothing_mask("1"), 1);
        assert_eq!(smoothing_mask("2, 32"), 0b10 | 1 << 31);
        assert_eq!(smoothing_mask(""), 0);
    }
}
