//! Triangle mesh chunks
//!
//! A mesh is read completely before anything reaches the builder. Material
//! groups and smoothing masks refer to faces by position in the face list,
//! so they are kept alongside the raw lists and applied afterwards.

use super::chunk::*;
use crate::error::{ImportError, Location, Result};
use crate::notification::NotificationType;
use crate::scene::{FaceFlags, SceneBuilder};
use crate::types::{Transform, Vector2, Vector3};

/// Raw triangle as stored in the face list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFace {
    pub corners: [u16; 3],
    pub flags: u16,
}

impl RawFace {
    /// Edge visibility bits: 0x4 is AB, 0x2 is BC, 0x1 is CA
    pub fn face_flags(&self) -> FaceFlags {
        let mut flags = FaceFlags::empty();
        if self.flags & 0x4 != 0 {
            flags |= FaceFlags::EDGE_AB_VISIBLE;
        }
        if self.flags & 0x2 != 0 {
            flags |= FaceFlags::EDGE_BC_VISIBLE;
        }
        if self.flags & 0x1 != 0 {
            flags |= FaceFlags::EDGE_CA_VISIBLE;
        }
        flags
    }
}

/// Faces assigned to a material by name
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGroup {
    pub name: String,
    pub faces: Vec<u16>,
    pub offset: u64,
}

/// Everything read from one trimesh chunk
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vector3>,
    pub uvs: Vec<Vector2>,
    pub faces: Vec<RawFace>,
    pub material_groups: Vec<MaterialGroup>,
    pub smoothing: Vec<u32>,
    pub local: Option<Transform>,
}

impl MeshData {
    /// Read the children of an open trimesh chunk
    pub fn read(reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<Self> {
        let mut mesh = MeshData::default();
        while reader.has_child() {
            let chunk = reader.open()?;
            match chunk.id {
                TRI_VERTEXL => mesh.read_vertices(reader, chunk)?,
                TRI_FACEL1 => mesh.read_faces(reader, builder, chunk)?,
                TRI_MAPPINGCOORS => mesh.read_mapping(reader, chunk)?,
                TRI_LOCAL => mesh.read_local(reader)?,
                id => builder.notify(
                    NotificationType::Skipped,
                    Location::Offset(chunk.start),
                    format!("mesh chunk {id:#06X}"),
                ),
            }
            reader.close()?;
        }
        Ok(mesh)
    }

    fn read_vertices(&mut self, reader: &mut ChunkReader<'_>, chunk: ChunkHeader) -> Result<()> {
        let count = reader.read_u16()? as usize;
        check_count(reader, chunk, count, 12, "vertex list")?;
        self.vertices.reserve(count);
        for _ in 0..count {
            let x = reader.read_f32()?;
            let y = reader.read_f32()?;
            let z = reader.read_f32()?;
            self.vertices.push(Vector3::from_f32([x, y, z]));
        }
        Ok(())
    }

    fn read_mapping(&mut self, reader: &mut ChunkReader<'_>, chunk: ChunkHeader) -> Result<()> {
        let count = reader.read_u16()? as usize;
        check_count(reader, chunk, count, 8, "mapping list")?;
        self.uvs.reserve(count);
        for _ in 0..count {
            let u = reader.read_f32()? as f64;
            let v = reader.read_f32()? as f64;
            self.uvs.push(Vector2::new(u, v));
        }
        Ok(())
    }

    fn read_local(&mut self, reader: &mut ChunkReader<'_>) -> Result<()> {
        let mut rows = [Vector3::ZERO; 4];
        for row in rows.iter_mut() {
            let x = reader.read_f32()?;
            let y = reader.read_f32()?;
            let z = reader.read_f32()?;
            *row = Vector3::from_f32([x, y, z]);
        }
        self.local = Some(Transform::from_axes(rows[0], rows[1], rows[2], rows[3]));
        Ok(())
    }

    fn read_faces(
        &mut self,
        reader: &mut ChunkReader<'_>,
        builder: &mut SceneBuilder<'_>,
        chunk: ChunkHeader,
    ) -> Result<()> {
        let count = reader.read_u16()? as usize;
        check_count(reader, chunk, count, 8, "face list")?;
        self.faces.reserve(count);
        for _ in 0..count {
            let a = reader.read_u16()?;
            let b = reader.read_u16()?;
            let c = reader.read_u16()?;
            let flags = reader.read_u16()?;
            self.faces.push(RawFace {
                corners: [a, b, c],
                flags,
            });
        }

        while reader.has_child() {
            let sub = reader.open()?;
            match sub.id {
                TRI_MATERIAL => {
                    let name = reader.read_cstring()?;
                    let n = reader.read_u16()? as usize;
                    check_count(reader, sub, n, 2, "material group")?;
                    let mut faces = Vec::with_capacity(n);
                    for _ in 0..n {
                        faces.push(reader.read_u16()?);
                    }
                    self.material_groups.push(MaterialGroup {
                        name,
                        faces,
                        offset: sub.start,
                    });
                }
                TRI_SMOOTH => {
                    let available = (reader.remaining() / 4) as usize;
                    if available < self.faces.len() {
                        builder.notify(
                            NotificationType::Warning,
                            Location::Offset(sub.start),
                            format!(
                                "smoothing list covers {available} of {} faces",
                                self.faces.len()
                            ),
                        );
                    }
                    for _ in 0..available.min(self.faces.len()) {
                        self.smoothing.push(reader.read_u32()?);
                    }
                }
                id => builder.notify(
                    NotificationType::Skipped,
                    Location::Offset(sub.start),
                    format!("face list chunk {id:#06X}"),
                ),
            }
            reader.close()?;
        }
        Ok(())
    }
}

/// A count whose records would not fit in the rest of the chunk
fn check_count(
    reader: &ChunkReader<'_>,
    chunk: ChunkHeader,
    count: usize,
    record: u64,
    what: &str,
) -> Result<()> {
    let needed = count as u64 * record;
    if needed > reader.remaining() {
        return Err(ImportError::truncated(
            Location::Offset(chunk.start),
            format!(
                "{what} declares {count} records ({needed} bytes), {} left in chunk",
                reader.remaining()
            ),
        ));
    }
    Ok(())
}
