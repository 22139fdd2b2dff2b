//! Axis and winding adjustments applied to a finished scene

use crate::scene::Scene;
use crate::types::Vector3;

bitflags::bitflags! {
    /// Coordinate system adjustments.
    ///
    /// Swaps are applied before inversions, in the order XY, YZ, XZ.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TransformFlags: u8 {
        const INVERT_X = 0x01;
        const INVERT_Y = 0x02;
        const INVERT_Z = 0x04;
        const SWAP_XY = 0x08;
        const SWAP_YZ = 0x10;
        const SWAP_XZ = 0x20;
        /// Reverse the corner order of every face
        const INVERT_WINDING = 0x40;
    }
}

impl TransformFlags {
    /// Apply the axis part of the flags to one vector
    pub fn apply_to(&self, v: Vector3) -> Vector3 {
        let mut out = v;
        if self.contains(TransformFlags::SWAP_XY) {
            std::mem::swap(&mut out.x, &mut out.y);
        }
        if self.contains(TransformFlags::SWAP_YZ) {
            std::mem::swap(&mut out.y, &mut out.z);
        }
        if self.contains(TransformFlags::SWAP_XZ) {
            std::mem::swap(&mut out.x, &mut out.z);
        }
        if self.contains(TransformFlags::INVERT_X) {
            out.x = -out.x;
        }
        if self.contains(TransformFlags::INVERT_Y) {
            out.y = -out.y;
        }
        if self.contains(TransformFlags::INVERT_Z) {
            out.z = -out.z;
        }
        out
    }
}

/// Rewrite every vertex and face of the scene according to `flags`.
///
/// Runs after decoding has finished; no decoder sees adjusted data.
pub fn apply_transform(scene: &mut Scene, flags: TransformFlags) {
    if flags.is_empty() {
        return;
    }
    for object in scene.objects.iter_mut() {
        for vertex in object.vertices.iter_mut() {
            *vertex = flags.apply_to(*vertex);
        }
        for face in object.faces.iter_mut() {
            if let Some(normal) = face.normal.as_mut() {
                *normal = flags.apply_to(*normal);
            }
            if flags.contains(TransformFlags::INVERT_WINDING) {
                face.invert_winding();
            }
        }
    }
}
