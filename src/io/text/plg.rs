//! REND386 polygon (.plg) decoder
//!
//! Each object is a header line `name nverts npolys`, then `nverts` rows
//! `x y z`, then `npolys` rows `color n i1 .. in`. Comments start with `#`
//! and may also trail a data row. Surface colours are 16-bit values written
//! in decimal or as `0x` hex; every distinct colour becomes one material.

use super::{parse_floats, tokens, LineCursor};
use crate::error::Result;
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::ByteSource;
use crate::notification::NotificationType;
use crate::scene::{Material, MaterialId, SceneBuilder};
use crate::types::Color;
use ahash::AHashMap;

const ABSOLUTE_COLOR: u16 = 0x8000;

/// Decoder for REND386 polygon files
#[derive(Debug, Default)]
pub struct PlgDecoder {
    materials: AHashMap<u16, MaterialId>,
}

impl PlgDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn material(&mut self, surface: u16, builder: &mut SceneBuilder<'_>) -> MaterialId {
        *self.materials.entry(surface).or_insert_with(|| {
            builder.add_material_def(Material::with_color(
                format!("plg_{surface:04X}"),
                surface_color(surface),
            ))
        })
    }
}

/// Colour of a REND386 surface descriptor.
///
/// With the top bit set the low byte is an absolute grey level; otherwise
/// bits 8..12 pick one of 15 hues (0 is grey) and the low byte is the
/// brightness.
pub fn surface_color(surface: u16) -> Color {
    let brightness = (surface & 0xFF) as f64 / 255.0;
    if surface & ABSOLUTE_COLOR != 0 {
        return Color::rgb(brightness, brightness, brightness);
    }
    let hue = (surface >> 8) & 0x0F;
    if hue == 0 {
        return Color::rgb(brightness, brightness, brightness);
    }
    let h = (hue - 1) as f64 / 15.0 * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    Color::rgb(r * brightness, g * brightness, b * brightness)
}

fn parse_surface(token: &str) -> Option<u16> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

/// Data part of a line, without a trailing `#` comment
fn strip_comment(text: &str) -> &str {
    text.split('#').next().unwrap_or_default().trim()
}

fn parse_header(text: &str) -> Option<(String, usize, usize)> {
    let mut it = tokens(text);
    let name = it.next()?.to_string();
    let vertices = it.next()?.parse().ok()?;
    let polygons = it.next()?.parse().ok()?;
    Some((name, vertices, polygons))
}

fn parse_polygon_row(text: &str) -> Option<(u16, Vec<usize>)> {
    let mut it = tokens(strip_comment(text));
    let surface = parse_surface(it.next()?)?;
    let n: usize = it.next()?.parse().ok()?;
    let indices: Vec<usize> = it
        .take(n)
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (indices.len() == n).then_some((surface, indices))
}

impl Decoder for PlgDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Plg
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        let mut cursor = LineCursor::new(source, &["#"]);

        while let Some(text) = cursor.next_line()? {
            let Some((name, vertex_count, polygon_count)) = parse_header(strip_comment(&text))
            else {
                builder.notify(
                    NotificationType::Skipped,
                    cursor.location(),
                    format!("unrecognized line '{text}'"),
                );
                continue;
            };
            log::trace!("plg object '{name}': {vertex_count} vertices, {polygon_count} polygons");
            builder.begin_object(&name);

            let vertices = cursor.read_rows(vertex_count, "vertices", |_| false, |row| {
                parse_floats(strip_comment(row), 3)
            })?;
            for v in vertices {
                builder.add_vertex(v[0], v[1], v[2]);
            }

            let polygons =
                cursor.read_rows_at(polygon_count, "polygons", |_| false, parse_polygon_row)?;
            for (location, (surface, indices)) in polygons {
                if builder.skip_degenerate(indices.len(), location) {
                    continue;
                }
                let material = self.material(surface, builder);
                match builder.add_polygon(&indices) {
                    Ok(face) => builder.set_face_material(face, material)?,
                    Err(err) => builder.recover(Err(err), location)?,
                }
            }
        }
        Ok(())
    }
}
