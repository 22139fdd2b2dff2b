//! RGBA colour used by materials

use std::fmt;

/// Colour with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    /// Create an opaque colour, clamping each component into `[0, 1]`
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Create a colour, clamping each component into `[0, 1]`
    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Color {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Normalize three unsigned bytes
    pub fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Scale the RGB components, keeping alpha
    pub fn scaled(&self, factor: f64) -> Self {
        Self::rgba(self.r * factor, self.g * factor, self.b * factor, self.a)
    }

    /// Same colour with a different alpha
    pub fn with_alpha(&self, a: f64) -> Self {
        Self::rgba(self.r, self.g, self.b, a)
    }

    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const GRAY: Color = Color { r: 0.5, g: 0.5, b: 0.5, a: 1.0 };

    /// Convert an AutoCAD Color Index to RGB.
    ///
    /// 1-9 are the named colours, 250-255 the gray ramp and 10-249 the
    /// colour wheel: hue steps of 15 degrees per ten indices, even indices
    /// fully saturated, odd indices at half saturation, and the brightness
    /// falling with the last digit.
    pub fn from_aci(index: i16) -> Self {
        let index = index.unsigned_abs();
        match index {
            1 => Color::rgb(1.0, 0.0, 0.0),
            2 => Color::rgb(1.0, 1.0, 0.0),
            3 => Color::rgb(0.0, 1.0, 0.0),
            4 => Color::rgb(0.0, 1.0, 1.0),
            5 => Color::rgb(0.0, 0.0, 1.0),
            6 => Color::rgb(1.0, 0.0, 1.0),
            8 => Color::from_bytes(128, 128, 128),
            9 => Color::from_bytes(192, 192, 192),
            10..=249 => {
                let hue = ((index / 10) - 1) as f64 * 15.0;
                let digit = index % 10;
                let value = [1.0, 1.0, 0.8, 0.8, 0.6, 0.6, 0.5, 0.5, 0.3, 0.3][digit as usize];
                let saturation = if digit % 2 == 0 { 1.0 } else { 0.5 };
                Self::from_hsv(hue, saturation, value)
            }
            250..=255 => {
                let level = 0.2 + (index - 250) as f64 * 0.16;
                Color::rgb(level, level, level)
            }
            _ => Color::WHITE,
        }
    }

    fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let c = value * saturation;
        let h = (hue % 360.0) / 60.0;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = value - c;
        Color::rgb(r + m, g + m, b + m)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({:.3}, {:.3}, {:.3}, {:.3})", self.r, self.g, self.b, self.a)
    }
}
