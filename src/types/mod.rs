//! Basic value types shared by the scene model and the decoders

pub mod color;
pub mod transform;
pub mod vector;

pub use color::Color;
pub use transform::Transform;
pub use vector::{Vector2, Vector3};
