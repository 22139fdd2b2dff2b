//! Wavefront object (.obj) decoder
//!
//! Positions and texture points are numbered across the whole file, while
//! scene objects own their vertices. Each object therefore keeps a map from
//! file-wide indices to its own, and copies a vertex in on first use.

use super::{parse_floats, tokens, LineCursor};
use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::notification::NotificationType;
use crate::scene::{Face, Material, MaterialId, SceneBuilder};
use crate::types::{Vector2, Vector3};
use ahash::AHashMap;

#[derive(Debug, Default)]
struct ObjectState {
    positions: AHashMap<usize, usize>,
    tex_points: AHashMap<usize, usize>,
}

/// Decoder for Wavefront objects
#[derive(Debug, Default)]
pub struct ObjDecoder {
    positions: Vec<Vector3>,
    tex_points: Vec<Vector2>,
    current: Option<ObjectState>,
    pending_name: Option<String>,
    material: Option<MaterialId>,
    smoothing: u32,
}

/// One `v/vt/vn` corner with file-relative (possibly negative) indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Corner {
    position: i64,
    tex: Option<i64>,
}

fn parse_corner(token: &str) -> Option<Corner> {
    let mut parts = token.split('/');
    let position = parts.next()?.parse().ok()?;
    let tex = match parts.next() {
        Some("") | None => None,
        Some(t) => Some(t.parse().ok()?),
    };
    Some(Corner { position, tex })
}

/// Resolve a 1-based or negative (relative to the end) index
fn resolve(index: i64, len: usize) -> Option<usize> {
    match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1).filter(|&i| i < len),
        i => len.checked_sub(i.unsigned_abs() as usize),
    }
}

impl ObjDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_object(&mut self, builder: &mut SceneBuilder<'_>) {
        if self.current.is_none() || self.pending_name.is_some() {
            let name = self.pending_name.take().unwrap_or_else(|| "Object".to_string());
            builder.begin_object(&name);
            self.current = Some(ObjectState::default());
        }
    }

    fn read_face(&mut self, rest: &str, location: Location, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let corners = tokens(rest)
            .map(parse_corner)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ImportError::malformed(location, format!("bad face 'f {rest}'")))?;
        self.ensure_object(builder);
        if builder.skip_degenerate(corners.len(), location) {
            return Ok(());
        }

        let mut indices = Vec::with_capacity(corners.len());
        let mut tex = Vec::with_capacity(corners.len());
        for corner in &corners {
            let Some(global) = resolve(corner.position, self.positions.len()) else {
                let err = ImportError::unresolved(location, format!("vertex {}", corner.position));
                return builder.recover(Err(err), location);
            };
            let Some(state) = self.current.as_mut() else {
                return Ok(());
            };
            let local = *state.positions.entry(global).or_insert_with(|| {
                let p = self.positions[global];
                builder.add_vertex(p.x, p.y, p.z)
            });
            indices.push(local);

            if let Some(t) = corner.tex.and_then(|t| resolve(t, self.tex_points.len())) {
                let local = *state.tex_points.entry(t).or_insert_with(|| {
                    let uv = self.tex_points[t];
                    builder.add_texture_point(uv.x, uv.y)
                });
                tex.push(local);
            }
        }

        let mut face = Face::new(indices);
        if tex.len() == face.len() {
            face.tex_coords = Some(tex);
        }
        face.material = self.material;
        face.smoothing_group = self.smoothing;
        match builder.add_face(face) {
            Ok(_) => Ok(()),
            Err(err) => builder.recover(Err(err), location),
        }
    }
}

impl Decoder for ObjDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Obj
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        let mut cursor = LineCursor::new(source, &["#"]);

        while let Some(text) = cursor.next_line()? {
            let location = cursor.location();
            let (keyword, rest) = text.split_once(char::is_whitespace).unwrap_or((text.as_str(), ""));
            let rest = rest.trim();
            match keyword {
                "v" => {
                    let p = parse_floats(rest, 3)
                        .ok_or_else(|| ImportError::malformed(location, format!("bad vertex '{text}'")))?;
                    self.positions.push(Vector3::new(p[0], p[1], p[2]));
                }
                "vt" => {
                    let mut it = tokens(rest).map(str::parse::<f64>);
                    let u = it.next().and_then(|r| r.ok()).ok_or_else(|| {
                        ImportError::malformed(location, format!("bad texture point '{text}'"))
                    })?;
                    let v = it.next().and_then(|r| r.ok()).unwrap_or(0.0);
                    self.tex_points.push(Vector2::new(u, v));
                }
                "f" => self.read_face(rest, location, builder)?,
                "o" | "g" => {
                    let name = if rest.is_empty() { "default" } else { rest };
                    self.pending_name = Some(name.to_string());
                }
                "usemtl" => {
                    let material = match builder.material_by_name(rest) {
                        Some(id) => id,
                        None => builder.add_material_def(Material::new(rest)),
                    };
                    self.material = Some(material);
                }
                "s" => {
                    self.smoothing = match rest.parse::<u32>() {
                        Ok(n) if n > 0 => 1 << ((n - 1) % 32),
                        _ => 0,
                    };
                }
                "mtllib" => builder.notify(
                    NotificationType::NotSupported,
                    location,
                    format!("material library '{rest}' not loaded"),
                ),
                // normals are recomputed from the winding
                "vn" => {}
                _ => builder.notify(
                    NotificationType::Skipped,
                    location,
                    format!("unrecognized line '{text}'"),
                ),
            }
        }
        Ok(())
    }
}
