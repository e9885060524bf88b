//! Color types.
//!
//! The simulation describes colors as normalized floats ([`LogicalColor`]);
//! the render side works with packed 8-bit channels ([`Color`]). Resolving one
//! into the other happens once per drawable and is memoized by the draw
//! dispatcher.

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Backend-native RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0, 255);
    pub const GREEN: Color = Color::new(0, 255, 0, 255);
    pub const BLUE: Color = Color::new(0, 0, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packed `0xAARRGGBB`.
    pub fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub fn to_rgba8(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    pub fn from_rgba8(px: Rgba<u8>) -> Self {
        let [r, g, b, a] = px.0;
        Self { r, g, b, a }
    }

    /// Source-over compositing of `self` on top of `dst`.
    pub fn over(self, dst: Color) -> Color {
        match self.a {
            255 => return self,
            0 => return dst,
            _ => {}
        }
        let sa = self.a as u32;
        let da = dst.a as u32;
        // out_a = sa + da * (1 - sa), all in 0..=255 fixed point
        let out_a = sa * 255 + da * (255 - sa);
        if out_a == 0 {
            return Color::TRANSPARENT;
        }
        let channel = |s: u8, d: u8| -> u8 {
            let num = s as u32 * sa * 255 + d as u32 * da * (255 - sa);
            ((num + out_a / 2) / out_a) as u8
        };
        Color {
            r: channel(self.r, dst.r),
            g: channel(self.g, dst.g),
            b: channel(self.b, dst.b),
            a: ((out_a + 127) / 255) as u8,
        }
    }
}

/// Color as authored by the simulation: normalized RGBA floats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogicalColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl LogicalColor {
    pub const WHITE: LogicalColor = LogicalColor::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: LogicalColor = LogicalColor::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Convert to the native representation. Channels are clamped to `0..=1`.
    pub fn resolve(&self) -> Color {
        let q = |v: f32| -> u8 {
            if v.is_nan() {
                0
            } else {
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        };
        Color::new(q(self.r), q(self.g), q(self.b), q(self.a))
    }
}

impl Default for LogicalColor {
    fn default() -> Self {
        LogicalColor::WHITE
    }
}
