//! Material definitions and their colour/percentage sub-chunks

use super::chunk::*;
use crate::error::{Location, Result};
use crate::notification::NotificationType;
use crate::scene::{ImageRef, Material, SceneBuilder, Texture, TextureFlags};
use crate::types::Color;

const TILING_DECAL: u16 = 0x0001;
const TILING_MIRROR: u16 = 0x0002;
const TILING_NO_TILE: u16 = 0x0010;

/// Read the children of an open material chunk and register the result
pub fn read_material(reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<()> {
    let mut material = Material::default();
    let mut self_illumination = None;
    let mut texture = None;

    while reader.has_child() {
        let chunk = reader.open()?;
        match chunk.id {
            MAT_NAME => material.name = reader.read_cstring()?,
            MAT_AMBIENT => {
                if let Some(c) = read_color(reader, builder)? {
                    material.ambient = c;
                }
            }
            MAT_DIFFUSE => {
                if let Some(c) = read_color(reader, builder)? {
                    material.diffuse = c;
                }
            }
            MAT_SPECULAR => {
                if let Some(c) = read_color(reader, builder)? {
                    material.specular = c;
                }
            }
            MAT_SHININESS => {
                if let Some(p) = read_percentage(reader, builder)? {
                    material.shininess = p * 128.0;
                }
            }
            MAT_SHIN2PCT => {
                if let Some(p) = read_percentage(reader, builder)? {
                    material.shininess_strength = p;
                }
            }
            MAT_TRANSPARENCY => {
                if let Some(p) = read_percentage(reader, builder)? {
                    material.transparency = p;
                }
            }
            MAT_SELF_ILPCT => self_illumination = read_percentage(reader, builder)?,
            MAT_TWO_SIDE => material.two_sided = true,
            MAT_REFLMAP => material.mirror = true,
            MAT_TEXMAP => texture = read_texture_map(reader, builder)?,
            id => builder.notify(
                NotificationType::Skipped,
                Location::Offset(chunk.start),
                format!("material chunk {id:#06X}"),
            ),
        }
        reader.close()?;
    }

    if let Some(p) = self_illumination {
        material.emission = material.diffuse.scaled(p);
    }
    if let Some(texture) = texture {
        material.texture = Some(builder.add_texture_def(texture));
    }
    if builder.material_by_name(&material.name).is_some() {
        builder.notify(
            NotificationType::Warning,
            Location::Unknown,
            format!("duplicate material '{}', first definition is used", material.name),
        );
    }
    log::trace!("material '{}'", material.name);
    builder.add_material_def(material);
    Ok(())
}

/// First well-formed colour sub-chunk of the open chunk.
///
/// Later colour sub-chunks (the linear variants usually follow the gamma
/// corrected ones) are read past but ignored.
pub fn read_color(reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<Option<Color>> {
    let mut color = None;
    while reader.has_child() {
        let chunk = reader.open()?;
        let value = match chunk.id {
            COLOR_F | LIN_COLOR_F if reader.remaining() >= 12 => {
                let r = reader.read_f32()? as f64;
                let g = reader.read_f32()? as f64;
                let b = reader.read_f32()? as f64;
                Some(Color::rgb(r, g, b))
            }
            COLOR_24 | LIN_COLOR_24 if reader.remaining() >= 3 => {
                let r = reader.read_u8()?;
                let g = reader.read_u8()?;
                let b = reader.read_u8()?;
                Some(Color::from_bytes(r, g, b))
            }
            id => {
                builder.notify(
                    NotificationType::Skipped,
                    Location::Offset(chunk.start),
                    format!("colour chunk {id:#06X} ({} bytes)", chunk.len),
                );
                None
            }
        };
        if color.is_none() {
            color = value;
        }
        reader.close()?;
    }
    Ok(color)
}

/// First well-formed percentage sub-chunk of the open chunk, as a fraction.
///
/// Integer percentages are stored as 0..100, float ones as 0..1.
pub fn read_percentage(reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<Option<f64>> {
    let mut value = None;
    while reader.has_child() {
        let chunk = reader.open()?;
        let parsed = match chunk.id {
            INT_PERCENTAGE if reader.remaining() >= 2 => Some(reader.read_u16()? as f64 / 100.0),
            FLOAT_PERCENTAGE if reader.remaining() >= 4 => Some(reader.read_f32()? as f64),
            id => {
                builder.notify(
                    NotificationType::Skipped,
                    Location::Offset(chunk.start),
                    format!("percentage chunk {id:#06X} ({} bytes)", chunk.len),
                );
                None
            }
        };
        if value.is_none() {
            value = parsed;
        }
        reader.close()?;
    }
    Ok(value)
}

fn read_texture_map(reader: &mut ChunkReader<'_>, builder: &mut SceneBuilder<'_>) -> Result<Option<Texture>> {
    let mut name = None;
    let mut tiling = None;
    while reader.has_child() {
        let chunk = reader.open()?;
        match chunk.id {
            MAT_MAPNAME => name = Some(reader.read_cstring()?),
            MAT_MAP_TILING => tiling = Some(reader.read_u16()?),
            // map strength
            INT_PERCENTAGE | FLOAT_PERCENTAGE => {}
            id => builder.notify(
                NotificationType::Skipped,
                Location::Offset(chunk.start),
                format!("texture map chunk {id:#06X}"),
            ),
        }
        reader.close()?;
    }

    Ok(name.map(|name| {
        let mut texture = Texture::new(name.clone(), ImageRef::new(name));
        if let Some(bits) = tiling {
            if bits & (TILING_NO_TILE | TILING_DECAL) != 0 {
                texture.flags.remove(TextureFlags::WRAP_U | TextureFlags::WRAP_V);
            }
            if bits & TILING_MIRROR != 0 {
                texture.flags.insert(TextureFlags::FLIP_U | TextureFlags::FLIP_V);
            }
        }
        texture
    }))
}
