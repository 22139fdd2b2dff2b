//! Format-agnostic scene model
//!
//! Every decoder converges on the types in this module. A [`Scene`] owns
//! its objects, materials and textures; objects own their vertices and
//! faces. Faces refer to vertices by index into the owning object and to
//! materials by [`MaterialId`] into the owning scene.

pub mod builder;
pub mod face;
pub mod material;
pub mod object;
pub mod post_process;

pub use builder::{DefaultSceneFactory, SceneBuilder, SceneFactory};
pub use face::{Face, FaceFlags};
pub use material::{ImageRef, Material, Texture, TextureFlags};
pub use object::{AnimationInfo, Node, Object};
pub use post_process::TransformFlags;

use crate::error::{ImportError, Location, Result};
use crate::notification::NotificationCollection;
use indexmap::IndexMap;
use std::fmt;

/// Index of a vertex within its object
pub type VertexIndex = usize;

/// Index of a face within its object
pub type FaceIndex = usize;

/// Handle of an object within a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

/// Handle of a material within a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

/// Handle of a texture within a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object #{}", self.0)
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material #{}", self.0)
    }
}

/// An imported scene
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Objects in load order
    pub objects: Vec<Object>,
    materials: Vec<Material>,
    /// First material registered under each name
    material_names: IndexMap<String, MaterialId>,
    pub textures: Vec<Texture>,
    /// Unit scale recorded by the file, if any
    pub master_scale: Option<f64>,
    /// Non-fatal issues met while decoding
    pub notifications: NotificationCollection,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    /// Look up the first material registered under `name`
    pub fn material_by_name(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    /// Register a material. Materials cannot be changed afterwards.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len());
        self.material_names
            .entry(material.name.clone())
            .or_insert(id);
        self.materials.push(material);
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    pub fn object_by_name(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Objects without a parent
    pub fn roots(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter().filter(|o| o.parent.is_none())
    }

    /// Total vertex count over all objects
    pub fn vertex_count(&self) -> usize {
        self.objects.iter().map(Object::vertex_count).sum()
    }

    /// Total face count over all objects
    pub fn face_count(&self) -> usize {
        self.objects.iter().map(Object::face_count).sum()
    }

    /// Apply axis swaps, inversions and winding changes in place
    pub fn apply_transform(&mut self, flags: TransformFlags) {
        post_process::apply_transform(self, flags);
    }

    /// Fill in normals for faces that have none
    pub fn compute_face_normals(&mut self) {
        for object in self.objects.iter_mut() {
            let vertices = &object.vertices;
            for face in object.faces.iter_mut() {
                if face.normal.is_none() {
                    face.normal = Some(face.normal(vertices));
                }
            }
        }
    }

    /// Check every cross reference in the scene.
    ///
    /// Face vertex and texture indices must be in range for their object,
    /// material and texture handles must resolve, and the object hierarchy
    /// must be consistent (one parent per child, listed in both directions).
    pub fn validate(&self) -> Result<()> {
        for (index, object) in self.objects.iter().enumerate() {
            for face in &object.faces {
                object.check_indices(face)?;
                if let Some(material) = face.material {
                    if self.material(material).is_none() {
                        return Err(ImportError::unresolved(
                            Location::Unknown,
                            format!("{material} on a face of '{}'", object.name),
                        ));
                    }
                }
            }
            if let Some(parent) = object.parent {
                let ok = self
                    .object(parent)
                    .is_some_and(|p| p.children.contains(&ObjectId(index)));
                if !ok {
                    return Err(ImportError::unresolved(
                        Location::Unknown,
                        format!("parent {parent} of '{}'", object.name),
                    ));
                }
            }
            for node in &object.nodes {
                if node.parent.is_some_and(|p| p >= object.nodes.len()) {
                    return Err(ImportError::unresolved(
                        Location::Unknown,
                        format!("parent of node '{}' in '{}'", node.name, object.name),
                    ));
                }
            }
        }
        for material in &self.materials {
            if let Some(texture) = material.texture {
                if self.texture(texture).is_none() {
                    return Err(ImportError::unresolved(
                        Location::Unknown,
                        format!("texture #{} of material '{}'", texture.0, material.name),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Vector3};

    #[test]
    fn test_material_lookup_first_wins() {
        let mut scene = Scene::new();
        let a = scene.add_material(Material::with_color("m", Color::WHITE));
        let _b = scene.add_material(Material::with_color("m", Color::BLACK));
        assert_eq!(scene.material_by_name("m"), Some(a));
        assert_eq!(scene.materials().len(), 2);
    }

    #[test]
    fn test_validate_catches_dangling_material() {
        let mut scene = Scene::new();
        let mut obj = Object::new("o");
        for i in 0..3 {
            obj.add_vertex(Vector3::new(i as f64, 0.0, 0.0));
        }
        let mut face = Face::triangle(0, 1, 2);
        face.material = Some(MaterialId(4));
        obj.faces.push(face);
        scene.objects.push(obj);
        assert!(matches!(
            scene.validate(),
            Err(ImportError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_counts() {
        let mut scene = Scene::new();
        let mut obj = Object::new("o");
        obj.add_vertex(Vector3::ZERO);
        scene.objects.push(obj.clone());
        scene.objects.push(obj);
        assert_eq!(scene.vertex_count(), 2);
        assert_eq!(scene.face_count(), 0);
        assert_eq!(scene.roots().count(), 2);
    }
}
