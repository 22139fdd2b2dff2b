//! Affine transforms for object placement
//!
//! Thin wrapper over `nalgebra::Matrix4<f64>` that speaks the layouts the
//! decoders meet on disk: row-major text rows, axis/origin blocks and
//! column-major float arrays.

use crate::types::Vector3;
use nalgebra::{Matrix4, Point3, Vector3 as NVector3};
use std::ops::Mul;

/// 4x4 affine transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Build from four rows, translation in the last column
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        let mut matrix = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                matrix[(r, c)] = *value;
            }
        }
        Self { matrix }
    }

    /// Build from four columns (`columns[3]` is the translation)
    pub fn from_columns(columns: [[f64; 4]; 4]) -> Self {
        let mut matrix = Matrix4::zeros();
        for (c, column) in columns.iter().enumerate() {
            for (r, value) in column.iter().enumerate() {
                matrix[(r, c)] = *value;
            }
        }
        Self { matrix }
    }

    /// Build from local axes and an origin
    pub fn from_axes(x_axis: Vector3, y_axis: Vector3, z_axis: Vector3, origin: Vector3) -> Self {
        Self::from_columns([
            [x_axis.x, x_axis.y, x_axis.z, 0.0],
            [y_axis.x, y_axis.y, y_axis.z, 0.0],
            [z_axis.x, z_axis.y, z_axis.z, 0.0],
            [origin.x, origin.y, origin.z, 1.0],
        ])
    }

    /// Translation only
    pub fn from_translation(translation: Vector3) -> Self {
        Self {
            matrix: Matrix4::new_translation(&NVector3::new(
                translation.x,
                translation.y,
                translation.z,
            )),
        }
    }

    /// Apply to a point (with translation)
    pub fn apply(&self, point: Vector3) -> Vector3 {
        let p = self
            .matrix
            .transform_point(&Point3::new(point.x, point.y, point.z));
        Vector3::new(p.x, p.y, p.z)
    }

    /// Apply to a direction (without translation)
    pub fn apply_direction(&self, direction: Vector3) -> Vector3 {
        let v = self
            .matrix
            .transform_vector(&NVector3::new(direction.x, direction.y, direction.z));
        Vector3::new(v.x, v.y, v.z)
    }

    /// Inverse transform, `None` when singular
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Translation component
    pub fn translation(&self) -> Vector3 {
        Vector3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }

    /// `self` applied after `other`
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            matrix: self.matrix * other.matrix,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Transform {
    type Output = Transform;
    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_translation() {
        let t = Transform::from_rows([
            [1.0, 0.0, 0.0, 5.0],
            [0.0, 1.0, 0.0, 6.0],
            [0.0, 0.0, 1.0, 7.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(t.apply(Vector3::ZERO), Vector3::new(5.0, 6.0, 7.0));
        assert_eq!(t.apply_direction(Vector3::UNIT_X), Vector3::UNIT_X);
        assert_eq!(t.translation(), Vector3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_axes_match_columns() {
        let t = Transform::from_axes(
            Vector3::UNIT_Y,
            -Vector3::UNIT_X,
            Vector3::UNIT_Z,
            Vector3::new(1.0, 0.0, 0.0),
        );
        // x maps onto the first axis, then the origin is added
        assert_eq!(t.apply(Vector3::UNIT_X), Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let inv = t.inverse().unwrap();
        assert!((inv * t).is_identity());
    }
}
