//! Materials and textures

use crate::scene::TextureId;
use crate::types::Color;

/// Surface description shared by faces.
///
/// A material is immutable once it has been added to a scene; faces refer
/// to it by [`MaterialId`](crate::scene::MaterialId).
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub emission: Color,
    /// Phong exponent
    pub shininess: f64,
    /// Specular strength in `[0, 1]`
    pub shininess_strength: f64,
    /// 0 = opaque, 1 = fully transparent
    pub transparency: f64,
    pub two_sided: bool,
    pub mirror: bool,
    /// Diffuse texture map
    pub texture: Option<TextureId>,
}

impl Material {
    /// Create a material with default colours
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Material with diffuse `color` and a dimmed ambient
    pub fn with_color(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            ambient: color.scaled(0.2),
            diffuse: color,
            ..Default::default()
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: Color::rgb(0.2, 0.2, 0.2),
            diffuse: Color::rgb(0.8, 0.8, 0.8),
            specular: Color::BLACK,
            emission: Color::BLACK,
            shininess: 0.0,
            shininess_strength: 0.0,
            transparency: 0.0,
            two_sided: false,
            mirror: false,
            texture: None,
        }
    }
}

/// Opaque reference to a texture image, usually a file name as stored in
/// the model. Loading the image is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(path: impl Into<String>) -> Self {
        ImageRef(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

bitflags::bitflags! {
    /// Texture sampling flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureFlags: u8 {
        const FLIP_U = 0x01;
        const FLIP_V = 0x02;
        const WRAP_U = 0x04;
        const WRAP_V = 0x08;
    }
}

/// A named texture map
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub image: ImageRef,
    pub flags: TextureFlags,
}

impl Texture {
    pub fn new(name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            image,
            flags: TextureFlags::WRAP_U | TextureFlags::WRAP_V,
        }
    }
}
