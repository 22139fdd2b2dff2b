//! Polygonal faces

use crate::scene::MaterialId;
use crate::types::Vector3;

bitflags::bitflags! {
    /// Per-face display flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaceFlags: u8 {
        /// Edge from the first to the second corner is visible
        const EDGE_AB_VISIBLE = 0x01;
        /// Edge from the second to the third corner is visible
        const EDGE_BC_VISIBLE = 0x02;
        /// Closing edge back to the first corner is visible
        const EDGE_CA_VISIBLE = 0x04;
        /// Rendered from both sides
        const TWO_SIDED = 0x08;
    }
}

impl Default for FaceFlags {
    fn default() -> Self {
        FaceFlags::EDGE_AB_VISIBLE | FaceFlags::EDGE_BC_VISIBLE | FaceFlags::EDGE_CA_VISIBLE
    }
}

/// A polygon referencing vertices of its owning object by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Face {
    /// Vertex indices in winding order (at least three)
    pub indices: Vec<usize>,
    /// Assigned material
    pub material: Option<MaterialId>,
    /// Per-corner indices into the object's texture points
    pub tex_coords: Option<Vec<usize>>,
    /// Explicit normal; computed from the winding when absent
    pub normal: Option<Vector3>,
    /// Smoothing group bit mask (0 = faceted)
    pub smoothing_group: u32,
    pub flags: FaceFlags,
}

impl Face {
    /// Create a face from vertex indices
    pub fn new(indices: Vec<usize>) -> Self {
        Self {
            indices,
            ..Default::default()
        }
    }

    /// Create a triangle
    pub fn triangle(a: usize, b: usize, c: usize) -> Self {
        Self::new(vec![a, b, c])
    }

    /// Number of corners
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn is_triangle(&self) -> bool {
        self.indices.len() == 3
    }

    /// Normal of the face against the given vertex array.
    ///
    /// Returns the explicit normal if one was read from the file.
    pub fn normal(&self, vertices: &[Vector3]) -> Vector3 {
        if let Some(normal) = self.normal {
            return normal;
        }
        let points: Vec<Vector3> = self
            .indices
            .iter()
            .filter_map(|&i| vertices.get(i).copied())
            .collect();
        if points.len() < 3 {
            return Vector3::ZERO;
        }
        Vector3::polygon_normal(&points)
    }

    /// Reverse the winding order, keeping texture corners aligned
    pub fn invert_winding(&mut self) {
        self.indices.reverse();
        if let Some(tex) = self.tex_coords.as_mut() {
            tex.reverse();
        }
        if let Some(normal) = self.normal.as_mut() {
            *normal = -*normal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_normal() {
        let vertices = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let face = Face::triangle(0, 1, 2);
        assert_eq!(face.normal(&vertices), Vector3::UNIT_Z);
    }

    #[test]
    fn test_explicit_normal_wins() {
        let mut face = Face::triangle(0, 1, 2);
        face.normal = Some(Vector3::UNIT_X);
        assert_eq!(face.normal(&[]), Vector3::UNIT_X);
    }

    #[test]
    fn test_invert_winding() {
        let mut face = Face::new(vec![0, 1, 2, 3]);
        face.tex_coords = Some(vec![4, 5, 6, 7]);
        face.invert_winding();
        assert_eq!(face.indices, vec![3, 2, 1, 0]);
        assert_eq!(face.tex_coords, Some(vec![7, 6, 5, 4]));
    }

    #[test]
    fn test_default_flags_show_all_edges() {
        let face = Face::triangle(0, 1, 2);
        assert!(face.flags.contains(FaceFlags::EDGE_CA_VISIBLE));
        assert!(!face.flags.contains(FaceFlags::TWO_SIDED));
    }
}
