//! trueSpace object (.cob) decoder, ASCII flavour
//!
//! After the `Caligari V00.01ALH` signature the file is a flat list of
//! chunks, each introduced by a header line
//! `<Type> V<version> Id <id> Parent <parent> Size <size>`. `PolH` chunks
//! carry a polygon object, `Mat1` chunks a material belonging to the
//! object named by their parent id, `END` closes the file. Other chunk
//! types are skipped line by line up to the next header.
//!
//! Faces name their material by a per-object `mat` index; those are bound
//! once every chunk has been read, since `Mat1` chunks follow the objects.

use super::{parse_floats, tokens, LineCursor, PatternSet};
use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::notification::NotificationType;
use crate::scene::{Face, FaceIndex, ImageRef, Material, MaterialId, ObjectId, SceneBuilder};
use crate::types::{Color, Transform, Vector3};
use ahash::AHashMap;

const SIGNATURE: &str = "Caligari";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Name,
    Center,
    XAxis,
    YAxis,
    ZAxis,
    Transform,
    WorldVertices,
    TextureVertices,
    Faces,
    FaceVerts,
    HoleVerts,
    MatNumber,
    Rgb,
    Alpha,
    Texture,
    Shader,
}

fn patterns() -> PatternSet<Key> {
    PatternSet::new()
        .keyword("Name", Key::Name)
        .keyword("center", Key::Center)
        .keyword("x axis", Key::XAxis)
        .keyword("y axis", Key::YAxis)
        .keyword("z axis", Key::ZAxis)
        .keyword("Transform", Key::Transform)
        .keyword("World Vertices", Key::WorldVertices)
        .keyword("Texture Vertices", Key::TextureVertices)
        .keyword("Faces", Key::Faces)
        .keyword("Face verts", Key::FaceVerts)
        .keyword("Hole verts", Key::HoleVerts)
        .keyword("mat#", Key::MatNumber)
        .keyword("rgb", Key::Rgb)
        .keyword("alpha", Key::Alpha)
        .keyword("texture:", Key::Texture)
        .keyword("shader:", Key::Shader)
}

/// Header line of a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CobChunk {
    pub kind: String,
    pub id: u64,
    pub parent: u64,
}

/// Parse `<Type> V0.08 Id 123 Parent 0 Size 456`
pub fn parse_chunk_header(text: &str) -> Option<CobChunk> {
    let t: Vec<&str> = text.split_whitespace().collect();
    if t.len() != 8 || !t[1].starts_with('V') || t[2] != "Id" || t[4] != "Parent" || t[6] != "Size" {
        return None;
    }
    Some(CobChunk {
        kind: t[0].to_string(),
        id: t[3].parse().ok()?,
        parent: t[5].parse().ok()?,
    })
}

/// Face waiting for its material
#[derive(Debug)]
struct PendingFace {
    object: ObjectId,
    chunk: u64,
    face: FaceIndex,
    material: u32,
    location: Location,
}

/// Decoder for ASCII trueSpace objects
#[derive(Debug, Default)]
pub struct CobDecoder {
    /// PolH chunk id to object
    objects: AHashMap<u64, ObjectId>,
    /// PolH chunk id to its parent chunk id
    parents: Vec<(u64, u64)>,
    /// (PolH chunk id, mat#) to material
    materials: AHashMap<(u64, u32), MaterialId>,
    pending: Vec<PendingFace>,
}

impl CobDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_polygon(
        &mut self,
        chunk: &CobChunk,
        cursor: &mut LineCursor<'_>,
        patterns: &PatternSet<Key>,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        let object = builder.begin_object("");
        self.objects.insert(chunk.id, object);
        self.parents.push((chunk.id, chunk.parent));

        let mut axes = [Vector3::ZERO, Vector3::UNIT_X, Vector3::UNIT_Y, Vector3::UNIT_Z];
        let mut transform = Transform::identity();
        let stop = |text: &str| patterns.matches(text) || parse_chunk_header(text).is_some();

        while let Some(text) = cursor.next_line()? {
            if parse_chunk_header(&text).is_some() {
                cursor.push_back(text);
                break;
            }
            let location = cursor.location();
            let Some((key, rest)) = patterns.classify(&text) else {
                builder.notify(NotificationType::Skipped, location, format!("unrecognized line '{text}'"));
                continue;
            };
            match key {
                Key::Name => builder.set_object_name(rest),
                Key::Center | Key::XAxis | Key::YAxis | Key::ZAxis => {
                    let v = parse_floats(rest, 3)
                        .ok_or_else(|| ImportError::malformed(location, format!("bad axis '{text}'")))?;
                    let slot = match key {
                        Key::Center => 0,
                        Key::XAxis => 1,
                        Key::YAxis => 2,
                        _ => 3,
                    };
                    axes[slot] = Vector3::new(v[0], v[1], v[2]);
                }
                Key::Transform => {
                    let rows = cursor.read_rows(4, "transform", stop, |l| parse_floats(l, 4))?;
                    let mut m = [[0.0; 4]; 4];
                    for (dst, row) in m.iter_mut().zip(&rows) {
                        dst.copy_from_slice(row);
                    }
                    transform = Transform::from_rows(m);
                }
                Key::WorldVertices => {
                    let n = parse_count(rest, location)?;
                    let rows = cursor.read_rows(n, "world vertices", stop, |l| parse_floats(l, 3))?;
                    for v in rows {
                        let p = transform.apply(Vector3::new(v[0], v[1], v[2]));
                        builder.add_vertex(p.x, p.y, p.z);
                    }
                }
                Key::TextureVertices => {
                    let n = parse_count(rest, location)?;
                    let rows = cursor.read_rows(n, "texture vertices", stop, |l| parse_floats(l, 2))?;
                    for uv in rows {
                        builder.add_texture_point(uv[0], uv[1]);
                    }
                }
                Key::Faces => {
                    let n = parse_count(rest, location)?;
                    self.read_faces(n, chunk.id, object, cursor, patterns, builder)?;
                }
                _ => builder.notify(
                    NotificationType::Skipped,
                    location,
                    format!("'{text}' outside its block"),
                ),
            }
        }

        builder.set_object_transform(Transform::from_axes(axes[1], axes[2], axes[3], axes[0]));
        Ok(())
    }

    fn read_faces(
        &mut self,
        count: usize,
        chunk_id: u64,
        object: ObjectId,
        cursor: &mut LineCursor<'_>,
        patterns: &PatternSet<Key>,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        for read in 0..count {
            let truncated = |location: Location| {
                ImportError::truncated(location, format!("faces: {count} declared, {read} present"))
            };
            let Some(text) = cursor.next_line()? else {
                return Err(truncated(cursor.location()));
            };
            let location = cursor.location();
            let (key, rest) = match patterns.classify(&text) {
                Some((key @ (Key::FaceVerts | Key::HoleVerts), rest)) => (key, rest.to_string()),
                _ => {
                    cursor.push_back(text);
                    return Err(truncated(cursor.location()));
                }
            };
            let attributes = face_attributes(&rest)
                .ok_or_else(|| ImportError::malformed(location, format!("bad face header '{text}'")))?;

            let mut pairs = Vec::with_capacity(attributes.verts);
            while pairs.len() < attributes.verts {
                let Some(line) = cursor.next_line()? else {
                    return Err(truncated(cursor.location()));
                };
                if patterns.matches(&line) || parse_chunk_header(&line).is_some() {
                    cursor.push_back(line);
                    return Err(truncated(cursor.location()));
                }
                let more = parse_pairs(&line).ok_or_else(|| {
                    ImportError::malformed(cursor.location(), format!("bad corner list '{line}'"))
                })?;
                pairs.extend(more);
            }
            pairs.truncate(attributes.verts);

            if key == Key::HoleVerts {
                log::trace!("hole with {} corners skipped", pairs.len());
                continue;
            }
            if builder.skip_degenerate(pairs.len(), location) {
                continue;
            }

            let mut face = Face::new(pairs.iter().map(|&(v, _)| v).collect());
            let tex_count = builder.texture_point_count();
            if tex_count > 0 && pairs.iter().all(|&(_, t)| t < tex_count) {
                face.tex_coords = Some(pairs.iter().map(|&(_, t)| t).collect());
            }
            match builder.add_face(face) {
                Ok(face) => self.pending.push(PendingFace {
                    object,
                    chunk: chunk_id,
                    face,
                    material: attributes.material,
                    location,
                }),
                Err(err) => builder.recover(Err(err), location)?,
            }
        }
        Ok(())
    }

    fn read_material(
        &mut self,
        chunk: &CobChunk,
        cursor: &mut LineCursor<'_>,
        patterns: &PatternSet<Key>,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        let mut index = 0u32;
        let mut color = Color::GRAY;
        let mut alpha = 1.0;
        let mut ka = 0.1;
        let mut ks = 0.5;
        let mut exponent = 0.0;
        let mut texture = None;

        while let Some(text) = cursor.next_line()? {
            if parse_chunk_header(&text).is_some() {
                cursor.push_back(text);
                break;
            }
            let location = cursor.location();
            match patterns.classify(&text) {
                Some((Key::MatNumber, rest)) => {
                    index = rest
                        .trim()
                        .parse()
                        .map_err(|_| ImportError::malformed(location, format!("bad material index '{text}'")))?;
                }
                Some((Key::Rgb, rest)) => {
                    let c = parse_floats(rest, 3)
                        .ok_or_else(|| ImportError::malformed(location, format!("bad colour '{text}'")))?;
                    color = Color::rgb(c[0], c[1], c[2]);
                }
                Some((Key::Alpha, _)) => {
                    let values: Vec<&str> = tokens(&text).collect();
                    for pair in values.chunks(2) {
                        let [name, value] = pair else { continue };
                        let Ok(value) = value.parse::<f64>() else { continue };
                        match *name {
                            "alpha" => alpha = value,
                            "ka" => ka = value,
                            "ks" => ks = value,
                            "exp" => exponent = value,
                            _ => {}
                        }
                    }
                }
                Some((Key::Texture, rest)) => texture = parse_texture_path(rest),
                Some((Key::Shader, _)) => {}
                _ => builder.notify(
                    NotificationType::Skipped,
                    location,
                    format!("unrecognized material line '{text}'"),
                ),
            }
        }

        let owner = self
            .objects
            .get(&chunk.parent)
            .and_then(|&id| builder.object(id))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "cob".to_string());
        let mut material = Material::with_color(format!("{owner}:{index}"), color);
        material.ambient = color.scaled(ka);
        material.specular = Color::WHITE.scaled(ks);
        material.shininess = exponent * 128.0;
        material.shininess_strength = ks;
        material.transparency = 1.0 - alpha;
        if let Some(path) = texture {
            material.texture = Some(builder.add_texture(&path, ImageRef::new(path.clone())));
        }
        let id = builder.add_material_def(material);
        self.materials.insert((chunk.parent, index), id);
        Ok(())
    }

    fn resolve(&mut self, builder: &mut SceneBuilder<'_>) -> Result<()> {
        for pending in std::mem::take(&mut self.pending) {
            let location = pending.location;
            builder.select_object(pending.object)?;
            match self.materials.get(&(pending.chunk, pending.material)) {
                Some(&material) => builder.set_face_material(pending.face, material)?,
                None => {
                    let err = ImportError::unresolved(location, format!("mat# {}", pending.material));
                    builder.recover(Err(err), location)?;
                }
            }
        }
        for &(child, parent) in &self.parents {
            let (Some(&child), Some(&parent)) = (self.objects.get(&child), self.objects.get(&parent)) else {
                continue;
            };
            if let Err(err) = builder.set_parent(child, parent) {
                builder.notify(NotificationType::Warning, Location::Unknown, err.to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct FaceAttributes {
    verts: usize,
    material: u32,
}

/// `4 flags 0 mat 2` following `Face verts`
fn face_attributes(rest: &str) -> Option<FaceAttributes> {
    let t: Vec<&str> = tokens(rest).collect();
    let verts = t.first()?.parse().ok()?;
    let material = t
        .iter()
        .position(|&s| s == "mat")
        .and_then(|i| t.get(i + 1))
        .map(|s| s.parse::<u32>().ok())
        .unwrap_or(Some(0))?;
    Some(FaceAttributes { verts, material })
}

fn parse_count(rest: &str, location: Location) -> Result<usize> {
    rest.trim()
        .parse()
        .map_err(|_| ImportError::malformed(location, format!("bad count '{rest}'")))
}

/// Corner pairs `<v,t> <v,t> ...`
fn parse_pairs(text: &str) -> Option<Vec<(usize, usize)>> {
    let mut pairs = Vec::new();
    for part in text.split('<').skip(1) {
        let inner = part.split('>').next()?;
        let (v, t) = inner.split_once(',')?;
        pairs.push((v.trim().parse().ok()?, t.trim().parse().ok()?));
    }
    (!pairs.is_empty()).then_some(pairs)
}

/// Texture paths are prefixed by their length: `texture: 12wood.bmp`
fn parse_texture_path(rest: &str) -> Option<String> {
    let rest = rest.trim();
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let path = match rest[..digits].parse::<usize>() {
        Ok(len) if rest.len() - digits == len => &rest[digits..],
        _ => rest,
    };
    (!path.is_empty()).then(|| path.to_string())
}

impl Decoder for CobDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Cob
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        let mut cursor = LineCursor::new(source, &[]);
        let signature = cursor.next_raw()?.unwrap_or_default();
        let version = signature
            .strip_prefix(SIGNATURE)
            .map(str::trim)
            .ok_or_else(|| ImportError::MalformedHeader(format!("expected '{SIGNATURE}' signature")))?;
        match version.as_bytes().get(6) {
            Some(b'A') => {}
            Some(b'B') => {
                return Err(ImportError::UnsupportedFormat("binary trueSpace files".to_string()))
            }
            _ => {
                return Err(ImportError::MalformedHeader(format!(
                    "unknown trueSpace version '{version}'"
                )))
            }
        }

        let patterns = patterns();
        let mut ended = false;
        while let Some(text) = cursor.next_line()? {
            let location = cursor.location();
            let Some(chunk) = parse_chunk_header(&text) else {
                builder.notify(NotificationType::Skipped, location, format!("unrecognized line '{text}'"));
                continue;
            };
            match chunk.kind.as_str() {
                "PolH" => self.read_polygon(&chunk, &mut cursor, &patterns, builder)?,
                "Mat1" => self.read_material(&chunk, &mut cursor, &patterns, builder)?,
                "END" => {
                    ended = true;
                    break;
                }
                other => {
                    builder.notify(NotificationType::Skipped, location, format!("chunk {other}"));
                    while let Some(line) = cursor.next_line()? {
                        if parse_chunk_header(&line).is_some() {
                            cursor.push_back(line);
                            break;
                        }
                    }
                }
            }
        }
        if !ended {
            builder.notify(NotificationType::Warning, cursor.location(), "missing END chunk");
        }
        self.resolve(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::StreamSource;
    use crate::scene::{DefaultSceneFactory, Scene};

    const QUAD: &str = "Caligari V00.01ALH             \n\
PolH V0.08 Id 100 Parent 0 Size 00000300\n\
Name Plane,1\n\
center 0 0 0\n\
x axis 1 0 0\n\
y axis 0 1 0\n\
z axis 0 0 1\n\
Transform\n\
1 0 0 5\n\
0 1 0 0\n\
0 0 1 0\n\
0 0 0 1\n\
World Vertices 4\n\
0 0 0\n\
1 0 0\n\
1 1 0\n\
0 1 0\n\
Texture Vertices 2\n\
0 0\n\
1 1\n\
Faces 2\n\
Face verts 4 flags 0 mat 0\n\
<0,0> <1,1> \n\
<2,1> <3,0>\n\
Hole verts 3 flags 0 mat 0\n\
<0,0> <1,0> <2,0>\n\
DrawFlags 0\n\
Unit V0.01 Id 101 Parent 100 Size 00000009\n\
Units 1\n\
Mat1 V0.06 Id 102 Parent 100 Size 00000085\n\
mat# 0\n\
shader: phong facet: auto32\n\
rgb 1,0,0\n\
alpha 0.5 ka 0.2 ks 0.5 exp 0 ior 1\n\
END V1.00 Id 0 Parent 0 Size 0\n";

    fn decode_str(text: &str, failsafe: bool) -> Result<Scene> {
        let factory = DefaultSceneFactory;
        let mut builder = SceneBuilder::new(&factory).with_failsafe(failsafe);
        let mut source = StreamSource::from_bytes(text.as_bytes().to_vec());
        CobDecoder::new().decode(&mut source, &mut builder)?;
        builder.finish()
    }

    #[test]
    fn test_polygon_with_material() {
        let scene = decode_str(QUAD, false).unwrap();
        assert_eq!(scene.objects.len(), 1);
        let object = &scene.objects[0];
        assert_eq!(object.name, "Plane,1");
        // transform translates x by 5
        assert_eq!(object.vertices[1], Vector3::new(6.0, 0.0, 0.0));
        // the hole is not a face
        assert_eq!(object.faces.len(), 1);
        assert_eq!(object.faces[0].indices, vec![0, 1, 2, 3]);
        assert_eq!(object.faces[0].tex_coords, Some(vec![0, 1, 1, 0]));

        let material = scene.material(object.faces[0].material.unwrap()).unwrap();
        assert_eq!(material.diffuse, Color::rgb(1.0, 0.0, 0.0));
        assert!((material.transparency - 0.5).abs() < 1e-9);
        assert!(scene.notifications.has_type(NotificationType::Skipped));
    }

    #[test]
    fn test_line_face_skipped() {
        let text = QUAD.replace(
            "Hole verts 3 flags 0 mat 0\n<0,0> <1,0> <2,0>\n",
            "Face verts 2 flags 0 mat 0\n<0,0> <1,0>\n",
        );
        let scene = decode_str(&text, false).unwrap();
        assert_eq!(scene.objects[0].faces.len(), 1);
        assert!(scene
            .notifications
            .of_type(NotificationType::Skipped)
            .iter()
            .any(|n| n.message.starts_with("2-corner polygon") && n.location == Location::Line(25)));
    }

    #[test]
    fn test_binary_is_unsupported() {
        let err = decode_str("Caligari V00.01BLH\n", false).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_signature() {
        let err = decode_str("PolH V0.08 Id 1 Parent 0 Size 0\n", false).unwrap_err();
        assert!(matches!(err, ImportError::MalformedHeader(_)));
    }

    #[test]
    fn test_missing_material() {
        let text = QUAD.replace("mat# 0", "mat# 3");
        assert!(matches!(
            decode_str(&text, false),
            Err(ImportError::UnresolvedReference { .. })
        ));
        let scene = decode_str(&text, true).unwrap();
        assert_eq!(scene.objects[0].faces[0].material, None);
    }

    #[test]
    fn test_truncated_vertices() {
        let text = QUAD.replace("World Vertices 4", "World Vertices 10");
        assert!(matches!(
            decode_str(&text, false),
            Err(ImportError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_chunk_header() {
        let chunk = parse_chunk_header("Mat1 V0.06 Id 7 Parent 3 Size 00000085").unwrap();
        assert_eq!((chunk.kind.as_str(), chunk.id, chunk.parent), ("Mat1", 7, 3));
        assert!(parse_chunk_header("Name Mat1").is_none());
    }

    #[test]
    fn test_texture_path() {
        assert_eq!(parse_texture_path("8wood.bmp"), Some("wood.bmp".to_string()));
        assert_eq!(parse_texture_path("3d.bmp"), Some("3d.bmp".to_string()));
    }
}
