//! Builder contract used by every decoder to populate a [`Scene`].
//!
//! Decoders never construct scenes or objects themselves; they ask the
//! [`SceneFactory`] handed to the importer. Tests can inject a factory to
//! observe or pre-configure what gets created.

use crate::error::{ImportError, Location, Result};
use crate::notification::NotificationType;
use crate::scene::{
    AnimationInfo, Face, FaceIndex, ImageRef, Material, MaterialId, Node, Object, ObjectId, Scene,
    Texture, TextureId, VertexIndex,
};
use crate::types::{Color, Transform, Vector2, Vector3};

/// Creates the containers a decode fills in
pub trait SceneFactory {
    /// Fresh, empty scene
    fn create_scene(&self) -> Scene {
        Scene::new()
    }

    /// Fresh object with the given name
    fn create_object(&self, name: &str) -> Object {
        Object::new(name)
    }
}

/// Factory producing plain default containers
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSceneFactory;

impl SceneFactory for DefaultSceneFactory {}

/// Incrementally populates a scene on behalf of a decoder.
///
/// Vertex and face operations target the *current* object, which is the
/// one most recently started with [`begin_object`](Self::begin_object) or
/// selected with [`select_object`](Self::select_object). If a decoder adds
/// geometry before starting any object, a default one is created.
pub struct SceneBuilder<'f> {
    scene: Scene,
    factory: &'f dyn SceneFactory,
    current: Option<ObjectId>,
    failsafe: bool,
}

impl<'f> SceneBuilder<'f> {
    pub fn new(factory: &'f dyn SceneFactory) -> Self {
        Self {
            scene: factory.create_scene(),
            factory,
            current: None,
            failsafe: false,
        }
    }

    /// Report recoverable reference errors as notifications
    pub fn with_failsafe(mut self, failsafe: bool) -> Self {
        self.failsafe = failsafe;
        self
    }

    pub fn failsafe(&self) -> bool {
        self.failsafe
    }

    /// Read access to everything built so far
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    /// Start a new object and make it current
    pub fn begin_object(&mut self, name: &str) -> ObjectId {
        let id = ObjectId(self.scene.objects.len());
        self.scene.objects.push(self.factory.create_object(name));
        self.current = Some(id);
        id
    }

    /// Make an existing object current
    pub fn select_object(&mut self, id: ObjectId) -> Result<()> {
        if id.0 >= self.scene.objects.len() {
            return Err(ImportError::unresolved(Location::Unknown, id.to_string()));
        }
        self.current = Some(id);
        Ok(())
    }

    pub fn current_object(&self) -> Option<ObjectId> {
        self.current
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.scene.object(id)
    }

    pub fn object_count(&self) -> usize {
        self.scene.objects.len()
    }

    fn current_mut(&mut self) -> &mut Object {
        let id = match self.current {
            Some(id) => id,
            None => self.begin_object("Object"),
        };
        &mut self.scene.objects[id.0]
    }

    /// Vertices in the current object
    pub fn vertex_count(&self) -> usize {
        self.current
            .map(|id| self.scene.objects[id.0].vertex_count())
            .unwrap_or(0)
    }

    /// Faces in the current object
    pub fn face_count(&self) -> usize {
        self.current
            .map(|id| self.scene.objects[id.0].face_count())
            .unwrap_or(0)
    }

    /// Texture points in the current object
    pub fn texture_point_count(&self) -> usize {
        self.current
            .map(|id| self.scene.objects[id.0].tex_points.len())
            .unwrap_or(0)
    }

    pub fn set_object_transform(&mut self, transform: Transform) {
        self.current_mut().transform = transform;
    }

    /// Rename the current object
    pub fn set_object_name(&mut self, name: &str) {
        self.current_mut().name = name.to_string();
    }

    /// Attach `child` under `parent`, keeping the single-parent invariant
    /// and refusing cycles.
    pub fn set_parent(&mut self, child: ObjectId, parent: ObjectId) -> Result<()> {
        let count = self.scene.objects.len();
        if child.0 >= count || parent.0 >= count {
            return Err(ImportError::unresolved(
                Location::Unknown,
                format!("parent link {parent} -> {child}"),
            ));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(ImportError::malformed(
                    Location::Unknown,
                    format!("hierarchy cycle through {child}"),
                ));
            }
            cursor = self.scene.objects[id.0].parent;
        }
        if let Some(old) = self.scene.objects[child.0].parent.take() {
            self.scene.objects[old.0].children.retain(|c| *c != child);
        }
        self.scene.objects[child.0].parent = Some(parent);
        self.scene.objects[parent.0].children.push(child);
        Ok(())
    }

    /// Add a named node to the current object and return its index
    pub fn add_node(&mut self, node: Node) -> usize {
        let object = self.current_mut();
        object.nodes.push(node);
        object.nodes.len() - 1
    }

    pub fn set_animation(&mut self, animation: AnimationInfo) {
        self.current_mut().animation = Some(animation);
    }

    // ---------------------------------------------------------------
    // Geometry
    // ---------------------------------------------------------------

    pub fn add_vertex(&mut self, x: f64, y: f64, z: f64) -> VertexIndex {
        self.current_mut().add_vertex(Vector3::new(x, y, z))
    }

    pub fn add_texture_point(&mut self, u: f64, v: f64) -> usize {
        self.current_mut().add_texture_point(Vector2::new(u, v))
    }

    pub fn add_triangle(&mut self, a: VertexIndex, b: VertexIndex, c: VertexIndex) -> Result<FaceIndex> {
        self.current_mut().add_face(Face::triangle(a, b, c))
    }

    pub fn add_polygon(&mut self, indices: &[VertexIndex]) -> Result<FaceIndex> {
        self.current_mut().add_face(Face::new(indices.to_vec()))
    }

    /// Add a fully described face
    pub fn add_face(&mut self, face: Face) -> Result<FaceIndex> {
        if let Some(material) = face.material {
            self.check_material(material)?;
        }
        self.current_mut().add_face(face)
    }

    fn face_mut(&mut self, face: FaceIndex) -> Result<&mut Face> {
        let object = self.current_mut();
        let count = object.faces.len();
        let name = object.name.clone();
        object.faces.get_mut(face).ok_or_else(|| {
            ImportError::unresolved(
                Location::Unknown,
                format!("face {face} in '{name}' ({count} faces)"),
            )
        })
    }

    fn check_material(&self, material: MaterialId) -> Result<()> {
        if self.scene.material(material).is_none() {
            return Err(ImportError::unresolved(Location::Unknown, material.to_string()));
        }
        Ok(())
    }

    pub fn set_face_material(&mut self, face: FaceIndex, material: MaterialId) -> Result<()> {
        self.check_material(material)?;
        self.face_mut(face)?.material = Some(material);
        Ok(())
    }

    pub fn set_face_smoothing(&mut self, face: FaceIndex, group: u32) -> Result<()> {
        self.face_mut(face)?.smoothing_group = group;
        Ok(())
    }

    /// Per-corner texture indices for an existing face
    pub fn set_face_tex_coords(&mut self, face: FaceIndex, tex: Vec<usize>) -> Result<()> {
        let object = self.current_mut();
        let mut candidate = object.faces.get(face).cloned().ok_or_else(|| {
            ImportError::unresolved(Location::Unknown, format!("face {face}"))
        })?;
        candidate.tex_coords = Some(tex);
        object.check_indices(&candidate)?;
        object.faces[face] = candidate;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Materials and textures
    // ---------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn add_material(
        &mut self,
        name: &str,
        ambient: Color,
        diffuse: Color,
        specular: Color,
        emission: Color,
        shininess: f64,
        mirror: bool,
    ) -> MaterialId {
        self.add_material_def(Material {
            name: name.to_string(),
            ambient,
            diffuse,
            specular,
            emission,
            shininess,
            mirror,
            ..Default::default()
        })
    }

    /// Register a complete material description
    pub fn add_material_def(&mut self, material: Material) -> MaterialId {
        self.scene.add_material(material)
    }

    pub fn material_by_name(&self, name: &str) -> Option<MaterialId> {
        self.scene.material_by_name(name)
    }

    pub fn add_texture(&mut self, name: &str, image: ImageRef) -> TextureId {
        self.add_texture_def(Texture::new(name, image))
    }

    /// Register a texture with explicit flags
    pub fn add_texture_def(&mut self, texture: Texture) -> TextureId {
        self.scene.textures.push(texture);
        TextureId(self.scene.textures.len() - 1)
    }

    pub fn set_master_scale(&mut self, scale: f64) {
        self.scene.master_scale = Some(scale);
    }

    // ---------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------

    pub fn notify(&mut self, kind: NotificationType, location: Location, message: impl Into<String>) {
        self.scene.notifications.notify(kind, location, message);
    }

    /// Points and lines have no surface: note a polygon of fewer than three
    /// corners as skipped and return `true` so the caller drops it.
    pub fn skip_degenerate(&mut self, corners: usize, location: Location) -> bool {
        if corners >= 3 {
            return false;
        }
        let name = self.current_mut().name.clone();
        self.notify(
            NotificationType::Skipped,
            location,
            format!("{corners}-corner polygon in '{name}'"),
        );
        true
    }

    /// Swallow a reference error in failsafe mode, propagate it otherwise
    pub fn recover(&mut self, result: Result<()>, location: Location) -> Result<()> {
        match result {
            Err(err @ ImportError::UnresolvedReference { .. }) if self.failsafe => {
                self.notify(NotificationType::Error, location, err.to_string());
                Ok(())
            }
            other => other.map_err(|e| e.at(location)),
        }
    }

    /// Validate and hand over the finished scene
    pub fn finish(self) -> Result<Scene> {
        self.scene.validate()?;
        Ok(self.scene)
    }
}
