//! DXF file reader

mod section_reader;
mod stream_reader;
mod text_reader;

pub use stream_reader::{DxfCodePair, DxfStreamReader};
pub use text_reader::DxfTextReader;

use section_reader::{LayerTable, SectionReader};

use crate::error::{ImportError, Result};
use crate::io::dxf::dxf_code;
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::notification::NotificationType;
use crate::scene::SceneBuilder;

/// Binary DXF files open with this sentinel
const BINARY_SENTINEL: &[u8] = b"AutoCAD Binary DXF";

/// ASCII DXF decoder producing one object per layer
#[derive(Debug, Default)]
pub struct DxfDecoder;

impl DxfDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Check if a stream contains binary DXF data; leaves the position at 0
    fn is_binary(source: &mut dyn ByteSource) -> Result<bool> {
        let mut buffer = [0u8; BINARY_SENTINEL.len()];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = source.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        source.seek(0)?;
        Ok(filled == buffer.len() && buffer == BINARY_SENTINEL)
    }

    /// Read sections until the `EOF` marker; `false` if input ended first
    fn read_sections(reader: &mut DxfTextReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<bool> {
        let mut layers = LayerTable::new();

        while let Some(pair) = reader.read_pair()? {
            if pair.is_marker("EOF") {
                return Ok(true);
            }
            if !pair.is_marker("SECTION") {
                continue;
            }

            let name = match reader.read_pair()? {
                Some(name) if name.code == dxf_code::NAME => name,
                Some(other) => {
                    return Err(ImportError::malformed(
                        other.location(),
                        format!("section name expected, found group code {}", other.code),
                    ))
                }
                None => return Err(ImportError::truncated(reader.location(), "section name")),
            };

            let mut section = SectionReader::new(reader, builder, &mut layers);
            match name.value_string.as_str() {
                "HEADER" => section.read_header()?,
                "TABLES" => section.read_tables()?,
                "ENTITIES" => section.read_entities()?,
                "BLOCKS" => {
                    section.skip_section()?;
                    builder.notify(
                        NotificationType::Skipped,
                        name.location(),
                        "block definitions are not instanced",
                    );
                }
                other => {
                    log::debug!("skipping section {other}");
                    section.skip_section()?;
                }
            }
        }
        Ok(false)
    }
}

impl Decoder for DxfDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Dxf
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        if Self::is_binary(source)? {
            return Err(ImportError::UnsupportedFormat("binary DXF".to_string()));
        }

        let mut reader = DxfTextReader::new(source);
        if !Self::read_sections(&mut reader, builder)? {
            builder.notify(
                NotificationType::Warning,
                reader.location(),
                "missing EOF marker",
            );
        }
        log::debug!("dxf: {} objects", builder.object_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::StreamSource;
    use crate::scene::{DefaultSceneFactory, FaceFlags};
    use crate::types::Color;

    /// Join code/value pairs into DXF text
    fn dxf(pairs: &[(i32, &str)]) -> Vec<u8> {
        pairs
            .iter()
            .map(|(code, value)| format!("{code:>3}\n{value}\n"))
            .collect::<String>()
            .into_bytes()
    }

    fn decode(bytes: Vec<u8>, failsafe: bool) -> Result<crate::scene::Scene> {
        let factory = DefaultSceneFactory;
        let mut builder = SceneBuilder::new(&factory).with_failsafe(failsafe);
        let mut source = StreamSource::from_bytes(bytes);
        DxfDecoder::new().decode(&mut source, &mut builder)?;
        builder.finish()
    }

    fn face3d(layer: &str, corners: [[f64; 3]; 4], flags: i16) -> Vec<(i32, String)> {
        let mut pairs = vec![(0, "3DFACE".to_string()), (8, layer.to_string())];
        for (i, c) in corners.iter().enumerate() {
            let i = i as i32;
            pairs.push((10 + i, c[0].to_string()));
            pairs.push((20 + i, c[1].to_string()));
            pairs.push((30 + i, c[2].to_string()));
        }
        pairs.push((70, flags.to_string()));
        pairs
    }

    fn document(tables: &[(i32, &str)], entities: Vec<(i32, String)>) -> Vec<u8> {
        let mut pairs: Vec<(i32, String)> = Vec::new();
        let mut push = |list: &[(i32, &str)]| {
            pairs.extend(list.iter().map(|(c, v)| (*c, v.to_string())));
        };
        push(&[(0, "SECTION"), (2, "HEADER"), (9, "$ACADVER"), (1, "AC1009"), (0, "ENDSEC")]);
        if !tables.is_empty() {
            push(&[(0, "SECTION"), (2, "TABLES")]);
            push(tables);
            push(&[(0, "ENDSEC")]);
        }
        push(&[(0, "SECTION"), (2, "ENTITIES")]);
        pairs.extend(entities);
        pairs.push((0, "ENDSEC".into()));
        pairs.push((0, "EOF".into()));
        let borrowed: Vec<(i32, &str)> = pairs.iter().map(|(c, v)| (*c, v.as_str())).collect();
        dxf(&borrowed)
    }

    const LAYERS: &[(i32, &str)] = &[
        (0, "TABLE"),
        (2, "LAYER"),
        (0, "LAYER"),
        (2, "walls"),
        (62, "1"),
        (0, "ENDTAB"),
    ];

    #[test]
    fn test_3dface_per_layer_objects() {
        let square = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let triangle = [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0]];
        let mut entities = face3d("walls", square, 1);
        entities.extend(face3d("roof", triangle, 0));
        entities.extend(face3d("walls", triangle, 0));

        let scene = decode(document(LAYERS, entities), false).unwrap();
        assert_eq!(scene.objects.len(), 2);

        let walls = scene.object_by_name("walls").unwrap();
        assert_eq!(walls.vertex_count(), 7);
        assert_eq!(walls.faces[0].indices, vec![0, 1, 2, 3]);
        assert_eq!(walls.faces[1].indices, vec![4, 5, 6]);
        assert!(!walls.faces[0].flags.contains(FaceFlags::EDGE_AB_VISIBLE));

        let material = walls.faces[0].material.unwrap();
        let material = scene.material(material).unwrap();
        assert_eq!(material.name, "walls");
        assert_eq!(material.diffuse, Color::from_aci(1));

        let roof = scene.object_by_name("roof").unwrap();
        assert_eq!(roof.faces[0].material, None);
        assert!(roof.faces[0].is_triangle());
    }

    #[test]
    fn test_polyface_mesh() {
        let mut entities: Vec<(i32, String)> = [
            (0, "POLYLINE"), (8, "mesh"), (66, "1"), (70, "64"), (71, "4"), (72, "2"),
        ]
        .iter()
        .map(|(c, v)| (*c, v.to_string()))
        .collect();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            for (c, v) in [(0, "VERTEX".to_string()), (10, format!("{x}")), (20, format!("{y}")), (30, "0".into()), (70, "192".into())] {
                entities.push((c, v));
            }
        }
        for (a, b, c) in [("1", "2", "3"), ("-1", "3", "4")] {
            for (code, v) in [(0, "VERTEX"), (10, "0"), (20, "0"), (30, "0"), (70, "128"), (71, a), (72, b), (73, c)] {
                entities.push((code, v.to_string()));
            }
        }
        entities.push((0, "SEQEND".into()));

        let scene = decode(document(&[], entities), false).unwrap();
        let mesh = scene.object_by_name("mesh").unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.faces[1].indices, vec![0, 2, 3]);
        assert!(!mesh.faces[1].flags.contains(FaceFlags::EDGE_AB_VISIBLE));
        assert!(mesh.faces[0].flags.contains(FaceFlags::EDGE_AB_VISIBLE));
    }

    #[test]
    fn test_polyface_bad_index() {
        let mut entities: Vec<(i32, String)> = vec![(0, "POLYLINE".into()), (70, "64".into())];
        for (code, v) in [(0, "VERTEX"), (10, "0"), (20, "0"), (70, "192"), (0, "VERTEX"), (70, "128"), (71, "1"), (72, "2"), (73, "9"), (0, "SEQEND")] {
            entities.push((code, v.to_string()));
        }

        let err = decode(document(&[], entities.clone()), false).unwrap_err();
        assert!(matches!(err, ImportError::UnresolvedReference { .. }));

        let scene = decode(document(&[], entities), true).unwrap();
        assert_eq!(scene.face_count(), 0);
        assert_eq!(scene.notifications.of_type(NotificationType::Error).len(), 1);
    }

    #[test]
    fn test_skipped_entities_and_missing_eof() {
        let mut bytes = dxf(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "LINE"),
            (10, "0"),
            (20, "0"),
            (0, "LINE"),
            (10, "1"),
            (20, "1"),
            (0, "ENDSEC"),
        ]);
        bytes.extend_from_slice(b"\n\n");
        let scene = decode(bytes, false).unwrap();
        assert_eq!(scene.objects.len(), 0);
        assert!(scene.notifications.iter().any(|n| n.message == "2 LINE entities"));
        assert_eq!(scene.notifications.of_type(NotificationType::Warning).len(), 1);
    }

    #[test]
    fn test_unclosed_section() {
        let bytes = dxf(&[(0, "SECTION"), (2, "ENTITIES"), (0, "LINE")]);
        assert!(matches!(
            decode(bytes, false),
            Err(ImportError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_binary_rejected() {
        let mut bytes = BINARY_SENTINEL.to_vec();
        bytes.extend_from_slice(b"\r\n\x1a\0");
        assert!(matches!(
            decode(bytes, false),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }
}
