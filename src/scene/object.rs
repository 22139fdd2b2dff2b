//! Scene objects: a vertex array, faces indexing into it, and placement

use crate::error::{ImportError, Location, Result};
use crate::scene::{Face, ObjectId};
use crate::types::{Transform, Vector2, Vector3};
use ahash::AHashMap;

/// Skeleton-like named entry attached to an object
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Index of the parent node in the same object
    pub parent: Option<usize>,
    /// Head position in object space
    pub head: Vector3,
    /// Tail position in object space
    pub tail: Vector3,
}

impl Node {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            head: Vector3::ZERO,
            tail: Vector3::ZERO,
        }
    }
}

/// Animation metadata; playback is out of scope
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationInfo {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

/// A mesh object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub name: String,
    pub vertices: Vec<Vector3>,
    pub tex_points: Vec<Vector2>,
    pub faces: Vec<Face>,
    /// Local placement as recorded in the file
    pub transform: Transform,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    pub nodes: Vec<Node>,
    pub animation: Option<AnimationInfo>,
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, position: Vector3) -> usize {
        self.vertices.push(position);
        self.vertices.len() - 1
    }

    /// Append a texture point and return its index
    pub fn add_texture_point(&mut self, uv: Vector2) -> usize {
        self.tex_points.push(uv);
        self.tex_points.len() - 1
    }

    /// Append a face after checking its indices against the current arrays
    pub fn add_face(&mut self, face: Face) -> Result<usize> {
        if face.indices.len() < 3 {
            return Err(ImportError::malformed(
                Location::Unknown,
                format!("face with {} corners in '{}'", face.indices.len(), self.name),
            ));
        }
        self.check_indices(&face)?;
        self.faces.push(face);
        Ok(self.faces.len() - 1)
    }

    /// Check a face against this object's vertex and texture arrays
    pub fn check_indices(&self, face: &Face) -> Result<()> {
        if let Some(&bad) = face.indices.iter().find(|&&i| i >= self.vertices.len()) {
            return Err(ImportError::unresolved(
                Location::Unknown,
                format!(
                    "vertex {bad} in '{}' ({} vertices)",
                    self.name,
                    self.vertices.len()
                ),
            ));
        }
        if let Some(tex) = &face.tex_coords {
            if tex.len() != face.indices.len() {
                return Err(ImportError::malformed(
                    Location::Unknown,
                    format!("{} texture corners for a {}-gon", tex.len(), face.indices.len()),
                ));
            }
            if let Some(&bad) = tex.iter().find(|&&i| i >= self.tex_points.len()) {
                return Err(ImportError::unresolved(
                    Location::Unknown,
                    format!("texture point {bad} in '{}'", self.name),
                ));
            }
        }
        Ok(())
    }

    /// Per-corner normals honouring smoothing groups.
    ///
    /// Corners of faces whose smoothing masks share a bit and that meet at
    /// the same vertex get the average of those faces' normals. Faces with
    /// mask 0 keep their own flat normal at every corner.
    pub fn corner_normals(&self) -> Vec<Vec<Vector3>> {
        let face_normals: Vec<Vector3> =
            self.faces.iter().map(|f| f.normal(&self.vertices)).collect();

        let mut incident: AHashMap<usize, Vec<usize>> = AHashMap::new();
        for (face_index, face) in self.faces.iter().enumerate() {
            if face.smoothing_group == 0 {
                continue;
            }
            for &v in &face.indices {
                incident.entry(v).or_default().push(face_index);
            }
        }

        self.faces
            .iter()
            .enumerate()
            .map(|(face_index, face)| {
                face.indices
                    .iter()
                    .map(|v| {
                        if face.smoothing_group == 0 {
                            return face_normals[face_index];
                        }
                        let mut sum = Vector3::ZERO;
                        for &other in incident.get(v).map(Vec::as_slice).unwrap_or(&[]) {
                            if self.faces[other].smoothing_group & face.smoothing_group != 0 {
                                sum += face_normals[other];
                            }
                        }
                        let n = sum.normalize();
                        if n == Vector3::ZERO {
                            face_normals[face_index]
                        } else {
                            n
                        }
                    })
                    .collect()
            })
            .collect()
    }
}
