//! Stereolithography (.stl) decoder
//!
//! Binary files are an 80 byte header, a little-endian facet count and
//! 50 bytes per facet. Text files start with `solid`; since some binary
//! exporters also write `solid` into the header, a file whose size matches
//! the binary layout exactly is read as binary.

use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::io::text::{parse_floats, LineCursor, PatternSet};
use crate::notification::NotificationType;
use crate::scene::{Face, SceneBuilder};
use crate::types::Vector3;
use ahash::AHashMap;
use byteorder::{ByteOrder, LittleEndian};

const HEADER_SIZE: u64 = 80;
const FACET_SIZE: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Solid,
    Facet,
    OuterLoop,
    Vertex,
    EndLoop,
    EndFacet,
    EndSolid,
}

fn patterns() -> PatternSet<Line> {
    PatternSet::new()
        .keyword("solid", Line::Solid)
        .keyword("facet normal", Line::Facet)
        .keyword("outer loop", Line::OuterLoop)
        .keyword("vertex", Line::Vertex)
        .keyword("endloop", Line::EndLoop)
        .keyword("endfacet", Line::EndFacet)
        .keyword("endsolid", Line::EndSolid)
}

/// Per-object vertex welding on exact coordinates
#[derive(Debug, Default)]
struct Welder {
    seen: AHashMap<[u64; 3], usize>,
}

impl Welder {
    fn index(&mut self, p: Vector3, builder: &mut SceneBuilder<'_>) -> usize {
        let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        *self
            .seen
            .entry(key)
            .or_insert_with(|| builder.add_vertex(p.x, p.y, p.z))
    }
}

fn add_facet(
    normal: Vector3,
    corners: &[Vector3],
    welder: &mut Welder,
    builder: &mut SceneBuilder<'_>,
) -> Result<()> {
    let indices = corners.iter().map(|&p| welder.index(p, builder)).collect();
    let mut face = Face::new(indices);
    if normal.length_squared() > 0.0 {
        face.normal = Some(normal.normalize());
    }
    builder.add_face(face)?;
    Ok(())
}

/// Decoder for stereolithography meshes
#[derive(Debug, Default)]
pub struct StlDecoder {
    welder: Welder,
}

impl StlDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the source is text; leaves the position at 0
    fn is_ascii(source: &mut dyn ByteSource) -> Result<bool> {
        let len = source.stream_len()?;
        let mut magic = [0u8; 5];
        let starts_solid = len >= 5 && {
            source.read_exact(&mut magic)?;
            magic.eq_ignore_ascii_case(b"solid")
        };
        let binary_size_matches = len >= HEADER_SIZE + 4 && {
            source.seek(HEADER_SIZE)?;
            let count = source.read_u32_le()? as u64;
            HEADER_SIZE + 4 + count * FACET_SIZE == len
        };
        source.seek(0)?;
        Ok(starts_solid && !binary_size_matches)
    }

    fn read_binary(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let len = source.stream_len()?;
        let header = source
            .read_vec(HEADER_SIZE as usize)
            .map_err(|_| ImportError::truncated(Location::Offset(0), "binary header"))?;
        let count = source.read_u32_le()? as u64;
        let needed = HEADER_SIZE + 4 + count * FACET_SIZE;
        if needed > len {
            return Err(ImportError::truncated(
                Location::Offset(HEADER_SIZE),
                format!("{count} facets need {needed} bytes, file has {len}"),
            ));
        }
        log::debug!("binary stl: {count} facets");

        let name = String::from_utf8_lossy(&header);
        let name = name.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        builder.begin_object(if name.is_empty() { "Object" } else { name });

        let body = source.read_vec((count * FACET_SIZE) as usize)?;
        for (i, facet) in body.chunks_exact(FACET_SIZE as usize).enumerate() {
            let mut values = [0f32; 12];
            LittleEndian::read_f32_into(&facet[..48], &mut values);
            let normal = Vector3::from_f32([values[0], values[1], values[2]]);
            let corners: Vec<Vector3> = values[3..]
                .chunks_exact(3)
                .map(|v| Vector3::from_f32([v[0], v[1], v[2]]))
                .collect();
            add_facet(normal, &corners, &mut self.welder, builder).map_err(|e| {
                e.at(Location::Offset(HEADER_SIZE + 4 + i as u64 * FACET_SIZE))
            })?;
        }
        Ok(())
    }

    fn read_ascii(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let patterns = patterns();
        let mut cursor = LineCursor::new(source, &[]);
        let mut in_solid = false;
        let mut facet: Option<(Vector3, Vec<Vector3>)> = None;

        while let Some(text) = cursor.next_line()? {
            let location = cursor.location();
            let Some((kind, rest)) = patterns.classify(&text) else {
                builder.notify(
                    NotificationType::Skipped,
                    location,
                    format!("unrecognized line '{text}'"),
                );
                continue;
            };
            match kind {
                Line::Solid => {
                    let name = if rest.is_empty() { "Object" } else { rest };
                    builder.begin_object(name);
                    self.welder = Welder::default();
                    in_solid = true;
                }
                Line::Facet => {
                    if !in_solid {
                        return Err(ImportError::malformed(location, "facet outside solid"));
                    }
                    let n = parse_floats(rest, 3).ok_or_else(|| {
                        ImportError::malformed(location, format!("bad facet normal '{text}'"))
                    })?;
                    facet = Some((Vector3::new(n[0], n[1], n[2]), Vec::with_capacity(3)));
                }
                Line::Vertex => {
                    let Some((_, corners)) = facet.as_mut() else {
                        return Err(ImportError::malformed(location, "vertex outside facet"));
                    };
                    let p = parse_floats(rest, 3).ok_or_else(|| {
                        ImportError::malformed(location, format!("bad vertex '{text}'"))
                    })?;
                    corners.push(Vector3::new(p[0], p[1], p[2]));
                }
                Line::EndFacet => {
                    let Some((normal, corners)) = facet.take() else {
                        return Err(ImportError::malformed(location, "endfacet without facet"));
                    };
                    add_facet(normal, &corners, &mut self.welder, builder)
                        .map_err(|e| e.at(location))?;
                }
                Line::EndSolid => in_solid = false,
                Line::OuterLoop | Line::EndLoop => {}
            }
        }

        if facet.is_some() {
            return Err(ImportError::truncated(cursor.location(), "facet without endfacet"));
        }
        if in_solid {
            builder.notify(NotificationType::Warning, cursor.location(), "missing endsolid");
        }
        Ok(())
    }
}

impl Decoder for StlDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Stl
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        if Self::is_ascii(source)? {
            self.read_ascii(source, builder)
        } else {
            self.read_binary(source, builder)
        }
    }
}
