//! 3D Studio (.3ds) decoder
//!
//! The file is one main chunk holding an editor chunk (materials and named
//! objects) and optionally a keyframer chunk (node hierarchy and animation
//! range). Unknown chunks are skipped by length at every level.
//!
//! Material assignments are deferred: they are collected per object while
//! its face list is read and resolved by name once the whole file has been
//! walked, so materials defined after the objects using them still bind.

pub mod chunk;
pub mod material;
pub mod mesh;

use self::chunk::*;
use self::mesh::{MaterialGroup, MeshData};
use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::notification::NotificationType;
use crate::scene::{AnimationInfo, Face, FaceIndex, ObjectId, SceneBuilder};
use ahash::AHashMap;
use indexmap::IndexMap;

const OBJ_LIGHT: u16 = 0x4600;
const OBJ_CAMERA: u16 = 0x4700;
const NO_PARENT: u16 = 0xFFFF;

/// Material groups of one object awaiting resolution
#[derive(Debug)]
struct PendingAssignments {
    object: ObjectId,
    /// File face position to scene face index, `None` for rejected faces
    face_map: Vec<Option<FaceIndex>>,
    groups: Vec<MaterialGroup>,
}

/// Object node from the keyframer section
#[derive(Debug, Clone)]
struct KeyframeNode {
    id: Option<u16>,
    name: String,
    parent: Option<u16>,
    offset: u64,
}

/// Decoder for 3D Studio chunk files
#[derive(Debug, Default)]
pub struct Max3dsDecoder {
    /// First object with each name
    objects: IndexMap<String, ObjectId>,
    pending: Vec<PendingAssignments>,
    nodes: Vec<KeyframeNode>,
    animation_name: Option<String>,
    segment: Option<(u32, u32)>,
    animation_length: Option<u32>,
}

impl Max3dsDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_version(&mut self, reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let version = reader.read_u32()?;
        log::debug!("3ds version {version}");
        if version > 3 {
            builder.notify(
                NotificationType::Warning,
                Location::Unknown,
                format!("file version {version} is newer than 3"),
            );
        }
        Ok(())
    }

    fn read_editor(&mut self, reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<()> {
        while reader.has_child() {
            let chunk = reader.open()?;
            match chunk.id {
                MESH_VERSION => {
                    let version = reader.read_u32()?;
                    log::debug!("mesh version {version}");
                }
                MASTER_SCALE => builder.set_master_scale(reader.read_f32()? as f64),
                EDIT_MATERIAL => material::read_material(reader, builder)?,
                EDIT_OBJECT => self.read_object(reader, builder)?,
                id => skipped(builder, id, chunk.start),
            }
            reader.close()?;
        }
        Ok(())
    }

    fn read_object(&mut self, reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let name = reader.read_cstring()?;
        while reader.has_child() {
            let chunk = reader.open()?;
            match chunk.id {
                OBJ_TRIMESH => {
                    let mesh = MeshData::read(reader, builder)?;
                    self.emit_mesh(&name, mesh, builder, chunk.start)?;
                }
                OBJ_LIGHT | OBJ_CAMERA => builder.notify(
                    NotificationType::NotSupported,
                    Location::Offset(chunk.start),
                    format!("light or camera '{name}'"),
                ),
                id => skipped(builder, id, chunk.start),
            }
            reader.close()?;
        }
        Ok(())
    }

    /// Hand one fully read mesh to the builder
    fn emit_mesh(
        &mut self,
        name: &str,
        mesh: MeshData,
        builder: &mut SceneBuilder<'_>,
        offset: u64,
    ) -> Result<()> {
        let object = builder.begin_object(name);
        self.objects.entry(name.to_string()).or_insert(object);

        for v in &mesh.vertices {
            builder.add_vertex(v.x, v.y, v.z);
        }
        let textured = !mesh.uvs.is_empty() && mesh.uvs.len() == mesh.vertices.len();
        if textured {
            for uv in &mesh.uvs {
                builder.add_texture_point(uv.x, uv.y);
            }
        } else if !mesh.uvs.is_empty() {
            builder.notify(
                NotificationType::Warning,
                Location::Offset(offset),
                format!(
                    "'{name}' has {} mapping coordinates for {} vertices",
                    mesh.uvs.len(),
                    mesh.vertices.len()
                ),
            );
        }

        let mut face_map = Vec::with_capacity(mesh.faces.len());
        for raw in &mesh.faces {
            let [a, b, c] = raw.corners.map(usize::from);
            let mut face = Face::triangle(a, b, c);
            face.flags = raw.face_flags();
            if textured {
                face.tex_coords = Some(vec![a, b, c]);
            }
            match builder.add_face(face) {
                Ok(index) => face_map.push(Some(index)),
                Err(err) => {
                    builder.recover(Err(err), Location::Offset(offset))?;
                    face_map.push(None);
                }
            }
        }

        for (position, group) in mesh.smoothing.iter().enumerate() {
            if let Some(Some(face)) = face_map.get(position) {
                builder.set_face_smoothing(*face, *group)?;
            }
        }
        if let Some(local) = mesh.local {
            builder.set_object_transform(local);
        }
        if !mesh.material_groups.is_empty() {
            self.pending.push(PendingAssignments {
                object,
                face_map,
                groups: mesh.material_groups,
            });
        }
        Ok(())
    }

    fn read_keyframer(&mut self, reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<()> {
        while reader.has_child() {
            let chunk = reader.open()?;
            match chunk.id {
                KF_HDR => {
                    let _revision = reader.read_u16()?;
                    self.animation_name = Some(reader.read_cstring()?);
                    self.animation_length = Some(reader.read_u32()?);
                }
                KF_SEG => {
                    let start = reader.read_u32()?;
                    let end = reader.read_u32()?;
                    self.segment = Some((start, end));
                }
                KF_OBJECT_NODE => self.read_object_node(reader, chunk.start)?,
                id => skipped(builder, id, chunk.start),
            }
            reader.close()?;
        }
        Ok(())
    }

    fn read_object_node(&mut self, reader: &mut ChunkReader<'_>, offset: u64) -> Result<()> {
        let mut node = KeyframeNode {
            id: None,
            name: String::new(),
            parent: None,
            offset,
        };
        while reader.has_child() {
            let chunk = reader.open()?;
            match chunk.id {
                KF_NODE_ID => node.id = Some(reader.read_u16()?),
                KF_NODE_HDR => {
                    node.name = reader.read_cstring()?;
                    let _flags1 = reader.read_u16()?;
                    let _flags2 = reader.read_u16()?;
                    let parent = reader.read_u16()?;
                    node.parent = (parent != NO_PARENT).then_some(parent);
                }
                // pivot and key tracks
                id => log::trace!("node chunk {id:#06X} ignored"),
            }
            reader.close()?;
        }
        self.nodes.push(node);
        Ok(())
    }

    fn resolve_materials(&mut self, builder: &mut SceneBuilder<'_>) -> Result<()> {
        for pending in std::mem::take(&mut self.pending) {
            builder.select_object(pending.object)?;
            for group in &pending.groups {
                let location = Location::Offset(group.offset);
                let Some(material) = builder.material_by_name(&group.name) else {
                    let err = ImportError::unresolved(location, format!("material '{}'", group.name));
                    builder.recover(Err(err), location)?;
                    continue;
                };
                for &position in &group.faces {
                    match pending.face_map.get(position as usize) {
                        Some(Some(face)) => builder.set_face_material(*face, material)?,
                        Some(None) => {}
                        None => {
                            let err = ImportError::unresolved(
                                location,
                                format!("face {position} in material group '{}'", group.name),
                            );
                            builder.recover(Err(err), location)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_hierarchy(&self, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let by_id: AHashMap<u16, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.unwrap_or(index as u16), index))
            .collect();

        let animation = self.animation_info();
        for node in &self.nodes {
            let location = Location::Offset(node.offset);
            let Some(&child) = self.objects.get(&node.name) else {
                builder.notify(
                    NotificationType::Skipped,
                    location,
                    format!("keyframer node '{}' has no mesh object", node.name),
                );
                continue;
            };
            if let Some(animation) = &animation {
                builder.select_object(child)?;
                builder.set_animation(animation.clone());
            }
            let Some(parent_id) = node.parent else {
                continue;
            };
            let parent = by_id
                .get(&parent_id)
                .and_then(|&index| self.objects.get(&self.nodes[index].name))
                .copied();
            match parent {
                Some(parent) => {
                    if let Err(err) = builder.set_parent(child, parent) {
                        builder.notify(NotificationType::Warning, location, err.to_string());
                    }
                }
                None => builder.notify(
                    NotificationType::Warning,
                    location,
                    format!("parent node {parent_id} of '{}' is not a mesh object", node.name),
                ),
            }
        }
        Ok(())
    }

    fn animation_info(&self) -> Option<AnimationInfo> {
        if self.animation_name.is_none() && self.segment.is_none() {
            return None;
        }
        let (start, end) = self
            .segment
            .unwrap_or((0, self.animation_length.unwrap_or(0)));
        Some(AnimationInfo {
            name: self.animation_name.clone().unwrap_or_default(),
            start: start as f64,
            end: end as f64,
        })
    }
}

fn skipped(builder: &mut SceneBuilder<'_>, id: u16, start: u64) {
    builder.notify(
        NotificationType::Skipped,
        Location::Offset(start),
        format!("unknown chunk {id:#06X}"),
    );
}

impl Decoder for Max3dsDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Max3ds
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        let mut reader = ChunkReader::new(source)?;
        let main = reader.open()?;
        if main.id != MAIN3DS {
            return Err(ImportError::MalformedHeader(format!(
                "expected main chunk {MAIN3DS:#06X}, found {:#06X}",
                main.id
            )));
        }

        while reader.has_child() {
            let chunk = reader.open()?;
            match chunk.id {
                M3D_VERSION => self.read_version(&mut reader, builder)?,
                EDIT3DS => self.read_editor(&mut reader, builder)?,
                KEYF3DS => self.read_keyframer(&mut reader, builder)?,
                id => skipped(builder, id, chunk.start),
            }
            reader.close()?;
        }
        reader.close()?;
        debug_assert_eq!(reader.depth(), 0);

        self.resolve_materials(builder)?;
        self.resolve_hierarchy(builder)
    }
}
