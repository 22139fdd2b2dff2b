//! Mapping from Blender datablocks to scene objects.
//!
//! Only the mapping lives here; every struct is read through [`Instance`],
//! so a struct missing from a file's DNA drops that contribution with a
//! notification instead of failing the decode.

use super::{BlendFile, Instance};
use crate::error::{ImportError, Location, Result};
use crate::notification::NotificationType;
use crate::scene::{AnimationInfo, Face, Material, MaterialId, Node, ObjectId, SceneBuilder};
use crate::types::{Color, Transform, Vector3};
use ahash::{AHashMap, AHashSet};

const OB: [u8; 4] = *b"OB\0\0";
const ME: [u8; 4] = *b"ME\0\0";
const MA: [u8; 4] = *b"MA\0\0";

const OB_MESH: i64 = 1;
const OB_ARMATURE: i64 = 25;

/// Blender's hardness range
const MAX_HARDNESS: f64 = 511.0;

pub(super) struct SceneMapper<'f> {
    file: &'f BlendFile,
    materials: AHashMap<u64, MaterialId>,
    objects: AHashMap<u64, ObjectId>,
    used_meshes: AHashSet<u64>,
    parents: Vec<(ObjectId, u64)>,
}

fn vector(values: Option<Vec<f64>>) -> Vector3 {
    match values.as_deref() {
        Some([x, y, z, ..]) => Vector3::new(*x, *y, *z),
        _ => Vector3::ZERO,
    }
}

impl<'f> SceneMapper<'f> {
    pub fn new(file: &'f BlendFile) -> Self {
        Self {
            file,
            materials: AHashMap::new(),
            objects: AHashMap::new(),
            used_meshes: AHashSet::new(),
            parents: Vec::new(),
        }
    }

    fn missing_struct(&self, name: &str, builder: &mut SceneBuilder<'_>) -> bool {
        if self.file.dna.struct_def(name).is_some() {
            return false;
        }
        builder.notify(
            NotificationType::Skipped,
            Location::Unknown,
            format!("struct '{name}' not in file schema"),
        );
        true
    }

    pub fn map(mut self, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let file = self.file;

        if !self.missing_struct("Material", builder) {
            for block in file.blocks_with_code(&MA) {
                for material in file.instances(block) {
                    let id = builder.add_material_def(read_material(&material));
                    self.materials.insert(block.old_address, id);
                }
            }
        }

        if !self.missing_struct("Object", builder) {
            for block in file.blocks_with_code(&OB) {
                for object in file.instances(block) {
                    let id = self.map_object(&object, builder)?;
                    self.objects.insert(block.old_address, id);
                }
            }
        }

        // meshes no object refers to still become objects
        if !self.missing_struct("Mesh", builder) {
            for block in file.blocks_with_code(&ME) {
                if self.used_meshes.contains(&block.old_address) {
                    continue;
                }
                for mesh in file.instances(block) {
                    let name = mesh.id_name().unwrap_or_else(|| "Mesh".to_string());
                    builder.begin_object(&name);
                    self.map_mesh(&mesh, builder)?;
                }
            }
        }

        for (child, address) in std::mem::take(&mut self.parents) {
            let result = match self.objects.get(&address) {
                Some(&parent) => builder.set_parent(child, parent),
                None => Err(ImportError::unresolved(
                    Location::Unknown,
                    format!("parent object at {address:#x}"),
                )),
            };
            if let Err(err) = result {
                builder.notify(NotificationType::Warning, Location::Unknown, err.to_string());
            }
        }
        Ok(())
    }

    fn map_object(&mut self, object: &Instance<'f>, builder: &mut SceneBuilder<'_>) -> Result<ObjectId> {
        let name = object.id_name().unwrap_or_else(|| "Object".to_string());
        let id = builder.begin_object(&name);

        if let Some(m) = object.numbers("obmat").filter(|m| m.len() == 16) {
            let column = |c: usize| [m[c * 4], m[c * 4 + 1], m[c * 4 + 2], m[c * 4 + 3]];
            builder.set_object_transform(Transform::from_columns([
                column(0),
                column(1),
                column(2),
                column(3),
            ]));
        }

        let data = object.pointer("data").unwrap_or(0);
        match object.int("type") {
            Some(OB_MESH) => {
                if let Some(mesh) = self.file.deref(data, "Mesh") {
                    self.used_meshes.insert(data);
                    self.map_mesh(&mesh, builder)?;
                }
            }
            Some(OB_ARMATURE) => {
                if let Some(armature) = self.file.deref(data, "bArmature") {
                    self.map_armature(&armature, builder);
                }
            }
            _ => {}
        }

        if let Some(animation) = self.animation(object) {
            builder.set_animation(animation);
        }
        if let Some(parent) = object.pointer("parent").filter(|&p| p != 0) {
            self.parents.push((id, parent));
        }
        Ok(id)
    }

    fn animation(&self, object: &Instance<'f>) -> Option<AnimationInfo> {
        let adt = self.file.deref(object.pointer("adt")?, "AnimData")?;
        let action = self.file.deref(adt.pointer("action")?, "bAction")?;
        Some(AnimationInfo {
            name: action.id_name().unwrap_or_default(),
            start: action.number("frame_start").unwrap_or(0.0),
            end: action.number("frame_end").unwrap_or(0.0),
        })
    }

    /// Face material slots of a mesh, in `mat_nr` order
    fn mesh_materials(&self, mesh: &Instance<'f>) -> Vec<Option<MaterialId>> {
        let count = mesh.int("totcol").unwrap_or(0).max(0) as usize;
        let Some(address) = mesh.pointer("mat").filter(|&p| p != 0) else {
            return Vec::new();
        };
        self.file
            .pointers_at(address, count)
            .into_iter()
            .map(|p| self.materials.get(&p).copied())
            .collect()
    }

    fn map_mesh(&mut self, mesh: &Instance<'f>, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let file = self.file;
        let name = mesh.id_name().unwrap_or_default();
        if !mesh.has_field("mvert") {
            builder.notify(
                NotificationType::NotSupported,
                Location::Unknown,
                format!("mesh '{name}' stores positions as attributes"),
            );
            return Ok(());
        }

        let vertices = file.instances_at(mesh.pointer("mvert").unwrap_or(0), "MVert");
        let base = builder.vertex_count();
        for vertex in &vertices {
            let co = vector(vertex.numbers("co"));
            builder.add_vertex(co.x, co.y, co.z);
        }
        log::trace!("mesh '{name}': {} vertices", vertices.len());

        let materials = self.mesh_materials(mesh);
        let polys = file.instances_at(mesh.pointer("mpoly").unwrap_or(0), "MPoly");
        if !polys.is_empty() {
            let loops: Vec<usize> = file
                .instances_at(mesh.pointer("mloop").unwrap_or(0), "MLoop")
                .iter()
                .map(|l| l.int("v").unwrap_or(0).max(0) as usize + base)
                .collect();
            let uvs = file.instances_at(mesh.pointer("mloopuv").unwrap_or(0), "MLoopUV");
            let tex_base = builder.texture_point_count();
            let textured = !uvs.is_empty() && uvs.len() == loops.len();
            if textured {
                for uv in &uvs {
                    let uv = uv.numbers("uv").unwrap_or_default();
                    builder.add_texture_point(
                        uv.first().copied().unwrap_or(0.0),
                        uv.get(1).copied().unwrap_or(0.0),
                    );
                }
            }

            for (index, poly) in polys.iter().enumerate() {
                let start = poly.int("loopstart").unwrap_or(0).max(0) as usize;
                let len = poly.int("totloop").unwrap_or(0).max(0) as usize;
                if builder.skip_degenerate(len, Location::Unknown) {
                    continue;
                }
                let Some(corners) = loops.get(start..start + len) else {
                    let err = ImportError::unresolved(
                        Location::Unknown,
                        format!("polygon {index} loops {start}..{} of {}", start + len, loops.len()),
                    );
                    builder.recover(Err(err), Location::Unknown)?;
                    continue;
                };
                let mut face = Face::new(corners.to_vec());
                if textured {
                    face.tex_coords = Some((tex_base + start..tex_base + start + len).collect());
                }
                self.add_face(face, poly.int("mat_nr"), &materials, builder)?;
            }
        } else {
            let faces = file.instances_at(mesh.pointer("mface").unwrap_or(0), "MFace");
            for face in &faces {
                let v = ["v1", "v2", "v3", "v4"].map(|f| face.int(f).unwrap_or(0).max(0) as usize);
                // v4 == 0 marks a triangle
                let indices = if v[3] == 0 { &v[..3] } else { &v[..] };
                let face_def = Face::new(indices.iter().map(|i| i + base).collect());
                self.add_face(face_def, face.int("mat_nr"), &materials, builder)?;
            }
        }
        Ok(())
    }

    fn add_face(
        &self,
        mut face: Face,
        slot: Option<i64>,
        materials: &[Option<MaterialId>],
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        let slot = slot.unwrap_or(0).max(0) as usize;
        if !materials.is_empty() {
            match materials.get(slot).copied().flatten() {
                Some(material) => face.material = Some(material),
                None => {
                    let err = ImportError::unresolved(
                        Location::Unknown,
                        format!("material slot {slot} of {}", materials.len()),
                    );
                    builder.recover(Err(err), Location::Unknown)?;
                }
            }
        }
        match builder.add_face(face) {
            Ok(_) => Ok(()),
            Err(err) => builder.recover(Err(err), Location::Unknown),
        }
    }

    fn map_armature(&self, armature: &Instance<'f>, builder: &mut SceneBuilder<'_>) {
        let first = armature
            .child("bonebase")
            .and_then(|list| list.pointer("first"))
            .unwrap_or(0);
        let mut visited = AHashSet::new();
        self.map_bones(first, None, &mut visited, builder);
    }

    /// Walk a `Bone` list and its child lists depth first
    fn map_bones(
        &self,
        mut address: u64,
        parent: Option<usize>,
        visited: &mut AHashSet<u64>,
        builder: &mut SceneBuilder<'_>,
    ) {
        while let Some(bone) = self.file.deref(address, "Bone") {
            if !visited.insert(address) {
                builder.notify(
                    NotificationType::Warning,
                    Location::Unknown,
                    format!("bone list loops back at {address:#x}"),
                );
                return;
            }
            let mut node = Node::new(bone.text("name").unwrap_or_default(), parent);
            node.head = vector(bone.numbers("head"));
            node.tail = vector(bone.numbers("tail"));
            let index = builder.add_node(node);

            if let Some(children) = bone.child("childbase").and_then(|l| l.pointer("first")) {
                self.map_bones(children, Some(index), visited, builder);
            }
            address = bone.pointer("next").unwrap_or(0);
        }
    }
}

fn read_material(material: &Instance<'_>) -> Material {
    let name = material.id_name().unwrap_or_else(|| "Material".to_string());
    let color = |r: &str, g: &str, b: &str| {
        Color::rgb(
            material.number(r).unwrap_or(0.8),
            material.number(g).unwrap_or(0.8),
            material.number(b).unwrap_or(0.8),
        )
    };
    let alpha = material.number("alpha").unwrap_or(1.0);
    let diffuse = color("r", "g", "b").with_alpha(alpha);

    let shininess = match (material.number("har"), material.number("roughness")) {
        (Some(har), _) => har / MAX_HARDNESS * 128.0,
        (None, Some(roughness)) => (1.0 - roughness) * 128.0,
        (None, None) => 0.0,
    };

    Material {
        name,
        ambient: diffuse.scaled(material.number("amb").unwrap_or(1.0)),
        diffuse,
        specular: color("specr", "specg", "specb"),
        emission: diffuse.scaled(material.number("emit").unwrap_or(0.0)),
        shininess,
        shininess_strength: material.number("spec").unwrap_or(0.5),
        transparency: 1.0 - alpha,
        mirror: material.number("ray_mirror").unwrap_or(0.0) > 0.0,
        ..Default::default()
    }
}
