//! # scene-import
//!
//! A pure Rust library for importing 3D scenes from legacy and interchange
//! file formats into one in-memory scene model.
//!
//! ## Features
//!
//! - 3D Studio (`.3ds`) chunk trees with materials, hierarchy and animation ranges
//! - Line-oriented text formats: ASC, PLG, COB and Wavefront OBJ
//! - PLY (ASCII and binary) and STL (ASCII and binary)
//! - Blender (`.blend`) files read through their embedded structure DNA
//! - ASCII DXF surfaces (`3DFACE`, `SOLID`, polyface and polygon meshes)
//! - Failsafe mode turning unresolved references into notifications
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scene_import::SceneImporter;
//!
//! let scene = SceneImporter::new().decode_file("ship.3ds")?;
//!
//! for object in &scene.objects {
//!     println!("{}: {} vertices", object.name, object.vertex_count());
//! }
//! for note in scene.notifications.iter() {
//!     println!("{note}");
//! }
//! # Ok::<(), scene_import::ImportError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ByteSource`] - seekable byte input with line and little-endian helpers
//! - [`Decoder`] - one implementation per format, driven by [`SceneImporter`]
//! - [`SceneBuilder`] - the only way decoders mutate a scene; it checks
//!   every face index as it is added
//! - [`Scene`] - objects, shared materials and notifications

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod io;
pub mod notification;
pub mod scene;
pub mod types;

// Re-export commonly used types
pub use error::{ImportError, Location, Result};
pub use notification::{Notification, NotificationCollection, NotificationType};
pub use types::{Color, Transform, Vector2, Vector3};

// Re-export scene types
pub use scene::{
    AnimationInfo, DefaultSceneFactory, Face, FaceFlags, Material, MaterialId, Node, Object,
    ObjectId, Scene, SceneBuilder, SceneFactory, Texture, TextureId, TransformFlags,
};

// Re-export I/O types
pub use io::{
    decode, ByteSource, Decoder, FormatTag, ImportConfiguration, SceneImporter, StreamSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
